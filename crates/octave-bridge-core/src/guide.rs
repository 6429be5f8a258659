use std::fmt::Write as _;

const RULE_WIDTH: usize = 80;
const SECTION_WIDTH: usize = 40;

/// Remediation text shown when no backend could be used. Each section either
/// explains how to make that backend usable or, when its probe passed, says
/// so in one line.
pub fn installation_guide(container_available: bool, local_available: bool) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let section_rule = "-".repeat(SECTION_WIDTH);
    let mut msg = String::new();

    let _ = writeln!(msg, "{rule}");
    let _ = writeln!(msg, "Octave Runtime Not Available");
    let _ = writeln!(msg, "{rule}");
    msg.push('\n');
    msg.push_str("octave-bridge needs GNU Octave to run functions. There are two ways to provide it:\n\n");

    let _ = writeln!(msg, "OPTION 1: Use Docker (Recommended)");
    let _ = writeln!(msg, "{section_rule}");
    if container_available {
        msg.push_str("✓ Docker is available!\n\n");
    } else {
        msg.push_str(
            "Docker is not installed or its daemon is not reachable.\n\
             \n\
             To install Docker:\n\
             \x20 • macOS: Docker Desktop (https://www.docker.com/products/docker-desktop) or OrbStack\n\
             \x20 • Linux: sudo apt-get install docker.io (Ubuntu/Debian)\n\
             \x20          sudo dnf install docker (Fedora/RHEL)\n\
             \x20 • Windows: Docker Desktop (https://www.docker.com/products/docker-desktop)\n\
             \n\
             After installation, start the daemon and make sure `docker version`\n\
             succeeds for your user (or set DOCKER_HOST), then try again.\n\n",
        );
    }

    let _ = writeln!(msg, "OPTION 2: Install Octave Locally");
    let _ = writeln!(msg, "{section_rule}");
    if local_available {
        msg.push_str("✓ Local Octave is available!\n\n");
    } else {
        msg.push_str(
            "No working octave-cli or octave binary was found on PATH.\n\
             \n\
             To install Octave:\n\
             \x20 • macOS: brew install octave\n\
             \x20 • Linux: sudo apt-get install octave (Ubuntu/Debian)\n\
             \x20          sudo dnf install octave (Fedora/RHEL)\n\
             \x20 • Windows: https://www.gnu.org/software/octave/download\n\n",
        );
    }

    msg.push_str(&rule);
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_missing_lists_both_remedies() {
        let guide = installation_guide(false, false);
        assert!(guide.contains("Octave Runtime Not Available"));
        assert!(guide.contains("OPTION 1: Use Docker (Recommended)"));
        assert!(guide.contains("OPTION 2: Install Octave Locally"));
        assert!(guide.contains("To install Docker:"));
        assert!(guide.contains("To install Octave:"));
        assert!(!guide.contains('✓'));
    }

    #[test]
    fn available_backend_section_is_pruned() {
        let guide = installation_guide(true, false);
        assert!(guide.contains("✓ Docker is available!"));
        assert!(!guide.contains("To install Docker:"));
        assert!(guide.contains("To install Octave:"));

        let guide = installation_guide(false, true);
        assert!(guide.contains("✓ Local Octave is available!"));
        assert!(guide.contains("To install Docker:"));
        assert!(!guide.contains("To install Octave:"));
    }

    #[test]
    fn guide_is_framed_by_rules() {
        let guide = installation_guide(false, false);
        let rule = "=".repeat(RULE_WIDTH);
        assert!(guide.starts_with(&rule));
        assert!(guide.ends_with(&rule));
    }
}
