use super::{Context, EXIT_FAILURE, EXIT_SUCCESS};
use octave_bridge_core::installation_guide;
use octave_bridge_runtime::{
    AvailabilityProbe, ContainerEngine, ContainerState, DockerCli, ExchangeLock, Workspace,
    CONFIG_FILE_NAME,
};

pub fn run(ctx: &Context) -> Result<u8, String> {
    let config = &ctx.config;
    let probe = AvailabilityProbe::from_config(config);
    let mut checks: Vec<Check> = Vec::new();

    if config.workspace.join(CONFIG_FILE_NAME).exists() {
        checks.push(Check::info(
            "config",
            &format!("Using {CONFIG_FILE_NAME} from the workspace"),
        ));
    } else {
        checks.push(Check::info("config", "No config file, using defaults"));
    }

    let container_available = check_container(&probe, ctx, &mut checks);
    let local_available = check_local(&probe, &mut checks);
    check_lock(ctx, &mut checks);

    let healthy = container_available || local_available;
    print_results(&checks, healthy, ctx.json)?;
    if !healthy && !ctx.json {
        println!("\n{}", installation_guide(container_available, local_available));
    }
    Ok(if healthy { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn check_container(probe: &AvailabilityProbe, ctx: &Context, checks: &mut Vec<Check>) -> bool {
    let Some(endpoint) = probe.find_container_endpoint() else {
        checks.push(Check::fail(
            "docker",
            "Docker engine not reachable on any known endpoint",
        ));
        return false;
    };
    checks.push(Check::pass(
        "docker",
        &format!("Docker engine reachable ({endpoint})"),
    ));

    let Some(binary) = probe.docker_binary() else {
        return true;
    };
    let docker = DockerCli::with_endpoint(binary, endpoint);
    let tag = &ctx.config.image_tag;
    match docker.image_exists(tag) {
        Ok(true) => checks.push(Check::pass("image", &format!("Image {tag} present"))),
        Ok(false) => checks.push(Check::info(
            "image",
            &format!("Image {tag} not built yet (built on first use)"),
        )),
        Err(e) => checks.push(Check::warn("image", &format!("Cannot inspect image: {e}"))),
    }
    let name = &ctx.config.container_name;
    match docker.container_state(name) {
        Ok(ContainerState::Running) => {
            checks.push(Check::pass("container", &format!("Container {name} running")));
        }
        Ok(ContainerState::Stopped) => checks.push(Check::info(
            "container",
            &format!("Container {name} stopped (restarted on first use)"),
        )),
        Ok(ContainerState::Absent) => checks.push(Check::info(
            "container",
            &format!("Container {name} does not exist yet"),
        )),
        Err(e) => checks.push(Check::warn(
            "container",
            &format!("Cannot inspect container: {e}"),
        )),
    }
    true
}

fn check_local(probe: &AvailabilityProbe, checks: &mut Vec<Check>) -> bool {
    if let Some(binary) = probe.find_local_runtime() {
        checks.push(Check::pass(
            "local_octave",
            &format!("Local Octave works ({})", binary.display()),
        ));
        true
    } else {
        checks.push(Check::fail(
            "local_octave",
            "No working octave-cli or octave on PATH",
        ));
        false
    }
}

fn check_lock(ctx: &Context, checks: &mut Vec<Check>) {
    let workspace = Workspace::new(&ctx.config.workspace, &ctx.config.shared_dir);
    if !workspace.shared_dir().exists() {
        return;
    }
    match ExchangeLock::try_acquire(&workspace.lock_path()) {
        Ok(Some(_)) => checks.push(Check::pass("exchange_lock", "Exchange lock is free")),
        Ok(None) => checks.push(Check::warn(
            "exchange_lock",
            "Exchange lock is held by another process",
        )),
        Err(e) => checks.push(Check::warn(
            "exchange_lock",
            &format!("Cannot check exchange lock: {e}"),
        )),
    }
}

fn print_results(checks: &[Check], healthy: bool, json_output: bool) -> Result<(), String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": healthy,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("octave-bridge doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if healthy {
            println!("At least one Octave runtime is usable.");
        } else {
            println!("No Octave runtime is usable. See the guide below.");
        }
    }
    Ok(())
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
