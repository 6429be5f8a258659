use octave_bridge_runtime::{
    AvailabilityProbe, BridgeConfig, ContainerSession, DockerCli, ExecutionSession, LocalSession,
    RuntimeError,
};
use tracing::info;

/// Probing and construction of the two backends, separated from the
/// selection policy so the policy can run without Docker or Octave.
pub trait BackendProvider: Send + Sync {
    fn container_available(&self) -> bool;

    fn local_available(&self) -> bool;

    fn open_container(&self, config: &BridgeConfig)
        -> Result<Box<dyn ExecutionSession>, RuntimeError>;

    fn open_local(&self, config: &BridgeConfig) -> Result<Box<dyn ExecutionSession>, RuntimeError>;
}

type Progress = Box<dyn Fn(&str) + Send + Sync>;

/// The real backends: Docker through its CLI and an interpreter on `PATH`.
pub struct SystemBackends {
    probe: AvailabilityProbe,
    progress: Progress,
}

impl SystemBackends {
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_probe(AvailabilityProbe::from_config(config))
    }

    pub fn with_probe(probe: AvailabilityProbe) -> Self {
        Self {
            probe,
            progress: Box::new(|line| info!("{line}")),
        }
    }

    /// Receive image build output line by line.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn probe(&self) -> &AvailabilityProbe {
        &self.probe
    }
}

impl BackendProvider for SystemBackends {
    fn container_available(&self) -> bool {
        self.probe.check_container_engine()
    }

    fn local_available(&self) -> bool {
        self.probe.check_local_runtime()
    }

    fn open_container(
        &self,
        config: &BridgeConfig,
    ) -> Result<Box<dyn ExecutionSession>, RuntimeError> {
        let docker = DockerCli::connect(&self.probe)?;
        let session = ContainerSession::open(docker, config, &*self.progress)?;
        Ok(Box::new(session))
    }

    fn open_local(&self, config: &BridgeConfig) -> Result<Box<dyn ExecutionSession>, RuntimeError> {
        Ok(Box::new(LocalSession::open(config, &self.probe)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_search_path_reports_nothing_available() {
        let dir = tempfile::tempdir().unwrap();
        let probe = AvailabilityProbe::default()
            .with_search_path(dir.path().as_os_str())
            .with_sockets(Vec::new());
        let backends = SystemBackends::with_probe(probe);
        assert!(!backends.container_available());
        assert!(!backends.local_available());

        let config = BridgeConfig::for_workspace(dir.path());
        assert!(matches!(
            backends.open_container(&config),
            Err(RuntimeError::BackendUnavailable(_))
        ));
        assert!(matches!(
            backends.open_local(&config),
            Err(RuntimeError::BackendUnavailable(_))
        ));
    }
}
