pub mod call;
pub mod completions;
pub mod doctor;
pub mod hygiene;
pub mod info;
pub mod man_pages;
pub mod stop;

use indicatif::{ProgressBar, ProgressStyle};
use octave_bridge_core::{CoreError, RuntimeManager, SystemBackends};
use octave_bridge_runtime::{BridgeConfig, RuntimeError};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_UNAVAILABLE: u8 = 2;
pub const EXIT_INVOCATION_FAILED: u8 = 3;

/// Message prefixes `main` maps to exit codes.
pub const UNAVAILABLE_PREFIX: &str = "runtime unavailable";
pub const INVOCATION_PREFIX: &str = "invocation failed";

/// Settings shared by every command.
pub struct Context {
    pub config: BridgeConfig,
    pub json: bool,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Spinner for human output, hidden in JSON mode so stdout stays parseable.
pub fn progress(ctx: &Context, msg: &str) -> ProgressBar {
    if ctx.json {
        ProgressBar::hidden()
    } else {
        spinner(msg)
    }
}

pub fn colorize_kind(kind: &str) -> String {
    use console::Style;
    match kind {
        "containerized" => Style::new().cyan().bold().apply_to(kind).to_string(),
        "local" => Style::new().green().apply_to(kind).to_string(),
        "unset" => Style::new().yellow().apply_to(kind).to_string(),
        "failed" => Style::new().red().apply_to(kind).to_string(),
        other => other.to_owned(),
    }
}

/// Manager over the real backends, with image build output forwarded to
/// the spinner.
pub fn manager(ctx: &Context, pb: &ProgressBar) -> RuntimeManager {
    let pb = pb.clone();
    let backends = SystemBackends::new(&ctx.config)
        .with_progress(move |line| pb.set_message(format!("building image: {line}")));
    RuntimeManager::with_provider(ctx.config.clone(), backends)
}

/// Render a core error as a CLI error message with the prefix that selects
/// its exit code.
pub fn describe_core_error(err: CoreError) -> String {
    match err {
        CoreError::Unavailable(guide) => format!("{UNAVAILABLE_PREFIX}\n{guide}"),
        CoreError::Runtime(e) => describe_runtime_error(&e),
        other => other.to_string(),
    }
}

pub fn describe_runtime_error(err: &RuntimeError) -> String {
    match err {
        RuntimeError::Execution { .. }
        | RuntimeError::ResultMissing { .. }
        | RuntimeError::ResultCorrupt { .. }
        | RuntimeError::Marshal(_) => format!("{INVOCATION_PREFIX}: {err}"),
        RuntimeError::BackendUnavailable(_) => format!("{UNAVAILABLE_PREFIX}: {err}"),
        other => other.to_string(),
    }
}

/// Exit code for an error message produced by a command.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with(UNAVAILABLE_PREFIX) {
        EXIT_UNAVAILABLE
    } else if msg.starts_with(INVOCATION_PREFIX) {
        EXIT_INVOCATION_FAILED
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"kind": "local"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"kind\""));
        assert!(result.contains("\"local\""));
    }

    #[test]
    fn colorize_kind_keeps_text() {
        for kind in ["containerized", "local", "unset", "failed"] {
            assert!(colorize_kind(kind).contains(kind));
        }
        assert_eq!(colorize_kind("other"), "other");
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_FAILURE, EXIT_UNAVAILABLE, EXIT_INVOCATION_FAILED];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn error_prefixes_select_exit_codes() {
        let unavailable = describe_core_error(CoreError::Unavailable("guide".to_owned()));
        assert_eq!(exit_code_for(&unavailable), EXIT_UNAVAILABLE);

        let failed = describe_core_error(CoreError::Runtime(RuntimeError::Execution {
            code: 1,
            output: "error: boom".to_owned(),
        }));
        assert_eq!(exit_code_for(&failed), EXIT_INVOCATION_FAILED);

        let other = describe_core_error(CoreError::Poisoned);
        assert_eq!(exit_code_for(&other), EXIT_FAILURE);
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
