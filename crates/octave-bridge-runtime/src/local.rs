//! Local execution: the interpreter found on the host, spawned once per
//! invocation with the workspace as its working directory.

use crate::config::BridgeConfig;
use crate::engine::ExecOutput;
use crate::probe::AvailabilityProbe;
use crate::process::{
    combined_output, exit_code, isolate_from_terminal_signals, parse_process_list,
};
use crate::session::{run_protocol, BackendKind, ExecutionSession};
use crate::workspace::Workspace;
use crate::RuntimeError;
use octave_bridge_script::{CommandBuffer, InvocationRequest, InvocationResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub struct LocalSession {
    binary: PathBuf,
    workspace: Workspace,
    commands: CommandBuffer,
    verbose: bool,
}

impl LocalSession {
    /// Attach to the first working interpreter the probe finds.
    pub fn open(config: &BridgeConfig, probe: &AvailabilityProbe) -> Result<Self, RuntimeError> {
        let binary = probe
            .find_local_runtime()
            .ok_or_else(|| RuntimeError::BackendUnavailable("local octave".to_owned()))?;
        Self::with_binary(binary, config)
    }

    pub fn with_binary(binary: impl Into<PathBuf>, config: &BridgeConfig) -> Result<Self, RuntimeError> {
        let root = std::fs::canonicalize(&config.workspace)?;
        Ok(Self {
            binary: binary.into(),
            workspace: Workspace::new(root, &config.shared_dir),
            commands: CommandBuffer::new(),
            verbose: config.verbose,
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn script_pattern(&self) -> String {
        self.workspace.script_path().display().to_string()
    }

    /// The interpreter run on this workspace's script. The script is passed by
    /// absolute path so the hygiene commands can find the process by it.
    fn interpreter_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--no-gui")
            .arg("--quiet")
            .arg(self.workspace.script_path())
            .current_dir(self.workspace.root())
            .stdin(Stdio::null());
        isolate_from_terminal_signals(&mut cmd);
        cmd
    }
}

impl ExecutionSession for LocalSession {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    fn commands_mut(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn invoke(&mut self, request: &InvocationRequest) -> Result<InvocationResult, RuntimeError> {
        let mut cmd = self.interpreter_command();
        run_protocol(
            &self.workspace,
            &mut self.commands,
            self.verbose,
            request,
            move |_| {
                debug!("{cmd:?}");
                let output = cmd.output()?;
                Ok(ExecOutput {
                    exit_code: exit_code(output.status),
                    output: combined_output(&output),
                })
            },
        )
    }

    /// Host processes running this workspace's script. Matching on the
    /// script path leaves unrelated interpreter sessions alone.
    fn check_running_processes(&self) -> Vec<String> {
        match Command::new("pgrep")
            .args(["-a", "-f", &self.script_pattern()])
            .stdin(Stdio::null())
            .output()
        {
            Ok(out) if out.status.success() => {
                parse_process_list(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                debug!("pgrep unavailable: {e}");
                Vec::new()
            }
        }
    }

    fn kill_running_processes(&self) -> bool {
        match Command::new("pkill")
            .args(["-9", "-f", &self.script_pattern()])
            .stdin(Stdio::null())
            .output()
        {
            Ok(out) => matches!(out.status.code(), Some(0 | 1)),
            Err(e) => {
                warn!("could not run pkill: {e}");
                false
            }
        }
    }

    fn teardown(&mut self) -> Result<(), RuntimeError> {
        self.commands.reset();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local interpreter {}", self.binary.display())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Fake interpreter; `$3` is the generated script path.
    fn fake_interpreter(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let bin_dir = dir.join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let path = bin_dir.join("octave-cli");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn invoke_runs_binary_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_interpreter(
            dir.path(),
            r#"[ "$1" = "--no-gui" ] && [ "$2" = "--quiet" ] || exit 9
grep -q 'plus(arg0, arg1)' "$3" || exit 8
printf '{"result": 5}' > .octave-bridge/result.json"#,
        );
        let config = BridgeConfig::for_workspace(dir.path());
        let mut session = LocalSession::with_binary(bin, &config).unwrap();
        let request = InvocationRequest::new("plus").unwrap().arg(2).arg(3);
        let result = session.invoke(&request).unwrap();
        assert_eq!(result.into_single().and_then(|v| v.as_f64()), Some(5.0));
        assert_eq!(session.kind(), BackendKind::Local);
    }

    #[test]
    fn failing_interpreter_reports_code_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_interpreter(dir.path(), "echo \"error: 'nope' undefined\" >&2; exit 1");
        let config = BridgeConfig::for_workspace(dir.path());
        let mut session = LocalSession::with_binary(bin, &config).unwrap();
        session.push_transient("warning('off', 'all');");
        let err = session
            .invoke(&InvocationRequest::new("nope").unwrap())
            .unwrap_err();
        match err {
            RuntimeError::Execution { code, output } => {
                assert_eq!(code, 1);
                assert!(output.contains("undefined"));
            }
            other => panic!("expected Execution, got {other:?}"),
        }
        assert!(session.commands().transient().is_empty());
    }

    #[test]
    fn teardown_clears_buffers_only() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_interpreter(dir.path(), "exit 0");
        let config = BridgeConfig::for_workspace(dir.path());
        let mut session = LocalSession::with_binary(&bin, &config).unwrap();
        session.eval("format long;");
        session.teardown().unwrap();
        assert!(session.commands().persistent().is_empty());
        assert_eq!(session.binary(), bin.as_path());
    }

    #[test]
    fn open_without_interpreter_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let probe = AvailabilityProbe::default()
            .with_search_path(dir.path().as_os_str())
            .with_sockets(Vec::new());
        let config = BridgeConfig::for_workspace(dir.path());
        assert!(matches!(
            LocalSession::open(&config, &probe),
            Err(RuntimeError::BackendUnavailable(_))
        ));
    }

    fn pgrep_available() -> bool {
        Command::new("pgrep")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    #[test]
    fn stray_interpreter_is_listed_and_killed() {
        if !pgrep_available() {
            eprintln!("skipping: pgrep not installed");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_interpreter(dir.path(), "sleep 5\nexit 0");
        let config = BridgeConfig::for_workspace(dir.path());
        let session = LocalSession::with_binary(bin, &config).unwrap();
        std::fs::create_dir_all(session.workspace.shared_dir()).unwrap();

        let mut stray = session.interpreter_command().spawn().unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        let mut found = session.check_running_processes();
        while found.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(25));
            found = session.check_running_processes();
        }
        assert_eq!(found.len(), 1, "{found:?}");
        assert!(found[0].contains(&session.script_pattern()));

        assert!(session.kill_running_processes());
        let status = stray.wait().unwrap();
        assert!(!status.success());
        assert!(session.check_running_processes().is_empty());
    }

    #[test]
    fn no_stale_processes_for_fresh_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_interpreter(dir.path(), "exit 0");
        let config = BridgeConfig::for_workspace(dir.path());
        let session = LocalSession::with_binary(bin, &config).unwrap();
        assert!(session.check_running_processes().is_empty());
    }
}
