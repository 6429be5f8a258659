//! Availability probes for the two backends.
//!
//! Probes are observers: they never return errors or panic, and every
//! internal failure collapses to "not available". They are cheap enough to
//! call again when composing diagnostics.

use crate::config::BridgeConfig;
use crate::process::{find_executable, status_with_timeout};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Well-known engine sockets tried after the default connection, in order.
pub const ALTERNATE_SOCKETS: &[&str] = &[
    "~/.orbstack/run/docker.sock",
    "/var/run/docker.sock",
    "~/Library/Containers/com.docker.docker/Data/docker.sock",
];

/// How to reach a container engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Whatever the client resolves by itself (`DOCKER_HOST`, current context).
    Default,
    Socket(PathBuf),
}

impl Endpoint {
    /// Value for the client's `--host` flag.
    pub fn host_arg(&self) -> Option<String> {
        match self {
            Self::Default => None,
            Self::Socket(path) => Some(format!("unix://{}", path.display())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Socket(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityProbe {
    docker_binary: String,
    sockets: Vec<PathBuf>,
    local_candidates: Vec<String>,
    timeout: Duration,
    search_path: Option<OsString>,
}

impl Default for AvailabilityProbe {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl AvailabilityProbe {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            docker_binary: "docker".to_owned(),
            sockets: ALTERNATE_SOCKETS.iter().map(|s| expand_tilde(s)).collect(),
            local_candidates: config.local_candidates.clone(),
            timeout: config.probe_timeout(),
            search_path: None,
        }
    }

    #[must_use]
    pub fn with_docker_binary(mut self, binary: impl Into<String>) -> Self {
        self.docker_binary = binary.into();
        self
    }

    #[must_use]
    pub fn with_sockets(mut self, sockets: Vec<PathBuf>) -> Self {
        self.sockets = sockets;
        self
    }

    /// Search this `PATH`-style list instead of the process `PATH`.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full path of the container client, if it is installed.
    pub fn docker_binary(&self) -> Option<PathBuf> {
        find_executable(&self.docker_binary, self.search_path.as_deref())
    }

    /// Default endpoint first, then the alternate sockets that exist.
    pub fn endpoint_candidates(&self) -> Vec<Endpoint> {
        let mut candidates = vec![Endpoint::Default];
        candidates.extend(
            self.sockets
                .iter()
                .filter(|p| p.exists())
                .cloned()
                .map(Endpoint::Socket),
        );
        candidates
    }

    /// Liveness check: the engine answered `version` within the timeout.
    pub fn ping(&self, endpoint: &Endpoint) -> bool {
        let Some(binary) = self.docker_binary() else {
            return false;
        };
        let mut cmd = Command::new(binary);
        if let Some(host) = endpoint.host_arg() {
            cmd.arg("--host").arg(host);
        }
        cmd.args(["version", "--format", "{{.Server.Version}}"]);
        let live = status_with_timeout(&mut cmd, self.timeout).is_some_and(|s| s.success());
        debug!("container engine endpoint {endpoint}: {}", if live { "live" } else { "failed" });
        live
    }

    pub fn find_container_endpoint(&self) -> Option<Endpoint> {
        self.endpoint_candidates()
            .into_iter()
            .find(|endpoint| self.ping(endpoint))
    }

    pub fn check_container_engine(&self) -> bool {
        self.find_container_endpoint().is_some()
    }

    /// First candidate interpreter on the search path that passes a smoke run.
    /// Only the first one found is tried.
    pub fn find_local_runtime(&self) -> Option<PathBuf> {
        let binary = self
            .local_candidates
            .iter()
            .find_map(|name| find_executable(name, self.search_path.as_deref()))?;
        let mut cmd = Command::new(&binary);
        cmd.args(["--eval", "disp('ok')"]);
        let works = status_with_timeout(&mut cmd, self.timeout).is_some_and(|s| s.success());
        debug!("local interpreter {}: {}", binary.display(), if works { "works" } else { "failed" });
        works.then_some(binary)
    }

    pub fn check_local_runtime(&self) -> bool {
        self.find_local_runtime().is_some()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn undetected(dir: &std::path::Path) -> AvailabilityProbe {
        AvailabilityProbe::default()
            .with_search_path(dir.as_os_str())
            .with_sockets(Vec::new())
            .with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn endpoint_display_and_host_arg() {
        assert_eq!(Endpoint::Default.to_string(), "default");
        assert_eq!(Endpoint::Default.host_arg(), None);
        let ep = Endpoint::Socket(PathBuf::from("/var/run/docker.sock"));
        assert_eq!(ep.host_arg().as_deref(), Some("unix:///var/run/docker.sock"));
    }

    #[test]
    fn candidates_skip_missing_sockets() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("docker.sock");
        std::fs::write(&present, "").unwrap();
        let probe = undetected(dir.path())
            .with_sockets(vec![dir.path().join("missing.sock"), present.clone()]);
        assert_eq!(
            probe.endpoint_candidates(),
            vec![Endpoint::Default, Endpoint::Socket(present)]
        );
    }

    #[test]
    fn nothing_on_path_means_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let probe = undetected(dir.path());
        assert!(!probe.check_container_engine());
        assert!(!probe.check_local_runtime());
    }

    #[cfg(unix)]
    #[test]
    fn live_docker_client_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "docker", "echo 27.0.1");
        let probe = undetected(dir.path());
        assert_eq!(probe.find_container_endpoint(), Some(Endpoint::Default));
        assert!(probe.check_container_engine());
    }

    #[cfg(unix)]
    #[test]
    fn falls_back_to_alternate_socket() {
        let dir = tempfile::tempdir().unwrap();
        // Only answers when pointed at an explicit socket.
        write_script(
            dir.path(),
            "docker",
            r#"[ "$1" = "--host" ] && exit 0; exit 1"#,
        );
        let sock = dir.path().join("docker.sock");
        std::fs::write(&sock, "").unwrap();
        let probe = undetected(dir.path()).with_sockets(vec![sock.clone()]);
        assert_eq!(probe.find_container_endpoint(), Some(Endpoint::Socket(sock)));
    }

    #[cfg(unix)]
    #[test]
    fn hanging_engine_times_out() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "docker", "sleep 10");
        let probe = undetected(dir.path()).with_timeout(Duration::from_millis(200));
        assert!(!probe.check_container_engine());
    }

    #[cfg(unix)]
    #[test]
    fn working_local_interpreter_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let bin = write_script(dir.path(), "octave-cli", "echo ok");
        let probe = undetected(dir.path());
        assert_eq!(probe.find_local_runtime(), Some(bin));
    }

    #[cfg(unix)]
    #[test]
    fn broken_local_interpreter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "octave-cli", "exit 2");
        let probe = undetected(dir.path());
        assert!(!probe.check_local_runtime());
    }

    #[cfg(unix)]
    #[test]
    fn second_candidate_used_when_first_missing() {
        let dir = tempfile::tempdir().unwrap();
        let bin = write_script(dir.path(), "octave", "exit 0");
        let probe = undetected(dir.path());
        assert_eq!(probe.find_local_runtime(), Some(bin));
    }

    #[test]
    fn availability_checks_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let probe = undetected(dir.path());
        assert_eq!(probe.check_local_runtime(), probe.check_local_runtime());
    }
}
