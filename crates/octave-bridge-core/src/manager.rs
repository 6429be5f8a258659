use crate::guide::installation_guide;
use crate::lifecycle::{validate_transition, ManagerState};
use crate::provider::{BackendProvider, SystemBackends};
use crate::CoreError;
use octave_bridge_runtime::{
    env_flag, share, BackendKind, BridgeConfig, ExecutionSession, SharedSession, VERBOSE_ENV,
};
use octave_bridge_script::{InvocationRequest, InvocationResult};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    Unset,
    Containerized,
    Local,
}

impl From<BackendKind> for RuntimeKind {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Containerized => Self::Containerized,
            BackendKind::Local => Self::Local,
        }
    }
}

/// Snapshot of the manager for diagnostics. Probe results are `None` until
/// the corresponding probe has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeDescriptor {
    pub kind: RuntimeKind,
    pub state: ManagerState,
    pub session: Option<String>,
    pub container_available: Option<bool>,
    pub local_available: Option<bool>,
    pub verbose: bool,
}

/// Picks one backend with a preference-ordered fallback and hands out the
/// resulting session. Once a backend is active it is returned by every later
/// `initialize`, whatever the preference.
pub struct RuntimeManager {
    config: BridgeConfig,
    provider: Box<dyn BackendProvider>,
    state: ManagerState,
    session: Option<SharedSession>,
    container_available: Option<bool>,
    local_available: Option<bool>,
    verbose: bool,
}

impl RuntimeManager {
    pub fn new(config: BridgeConfig) -> Self {
        let provider = SystemBackends::new(&config);
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: BridgeConfig, provider: impl BackendProvider + 'static) -> Self {
        let verbose = config.verbose || env_flag(VERBOSE_ENV);
        Self {
            config,
            provider: Box::new(provider),
            state: ManagerState::Unset,
            session: None,
            container_available: None,
            local_available: None,
            verbose,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Try the preferred backend, then the other one once. When neither can
    /// be used the error carries the installation guide followed by the
    /// construction failures, if any.
    pub fn initialize(&mut self, prefer_container: bool) -> Result<SharedSession, CoreError> {
        if let Some(session) = &self.session {
            debug!("runtime already initialized ({})", self.state);
            return Ok(Arc::clone(session));
        }

        let order = if prefer_container {
            [BackendKind::Containerized, BackendKind::Local]
        } else {
            [BackendKind::Local, BackendKind::Containerized]
        };

        let mut failures = Vec::new();
        for kind in order {
            if !self.probe(kind) {
                debug!("{kind} backend not available");
                continue;
            }
            match self.open(kind) {
                Ok(mut session) => {
                    let next = match kind {
                        BackendKind::Containerized => ManagerState::ContainerizedActive,
                        BackendKind::Local => ManagerState::LocalActive,
                    };
                    validate_transition(self.state, next)?;
                    session.set_verbose(self.verbose);
                    info!("using {kind} runtime: {}", session.describe());
                    let shared = share(session);
                    self.session = Some(Arc::clone(&shared));
                    self.state = next;
                    return Ok(shared);
                }
                Err(e) => {
                    warn!("{kind} backend failed to start: {e}");
                    failures.push(format!("{kind}: {e}"));
                }
            }
        }

        validate_transition(self.state, ManagerState::Failed)?;
        self.state = ManagerState::Failed;

        let mut message = installation_guide(
            self.container_available.unwrap_or(false),
            self.local_available.unwrap_or(false),
        );
        if !failures.is_empty() {
            message.push_str("\n\nBackend startup failures:\n");
            for failure in &failures {
                let _ = writeln!(message, "  - {failure}");
            }
        }
        Err(CoreError::Unavailable(message))
    }

    fn probe(&mut self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Containerized => {
                let available = self.provider.container_available();
                self.container_available = Some(available);
                available
            }
            BackendKind::Local => {
                let available = self.provider.local_available();
                self.local_available = Some(available);
                available
            }
        }
    }

    fn open(
        &self,
        kind: BackendKind,
    ) -> Result<Box<dyn ExecutionSession>, octave_bridge_runtime::RuntimeError> {
        let mut config = self.config.clone();
        config.verbose = self.verbose;
        match kind {
            BackendKind::Containerized => self.provider.open_container(&config),
            BackendKind::Local => self.provider.open_local(&config),
        }
    }

    /// Active session, if `initialize` has succeeded.
    pub fn session(&self) -> Option<SharedSession> {
        self.session.as_ref().map(Arc::clone)
    }

    /// Run one invocation on the active session.
    pub fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResult, CoreError> {
        let session = self.session.as_ref().ok_or(CoreError::NotInitialized)?;
        let mut guard = session.lock().map_err(|_| CoreError::Poisoned)?;
        Ok(guard.invoke(request)?)
    }

    pub fn set_verbose(&mut self, verbose: bool) -> Result<(), CoreError> {
        self.verbose = verbose;
        if let Some(session) = &self.session {
            session
                .lock()
                .map_err(|_| CoreError::Poisoned)?
                .set_verbose(verbose);
        }
        Ok(())
    }

    pub fn runtime_info(&self) -> RuntimeDescriptor {
        let (kind, session) = match &self.session {
            Some(shared) => match shared.lock() {
                Ok(s) => (RuntimeKind::from(s.kind()), Some(s.describe())),
                Err(_) => (self.kind_from_state(), None),
            },
            None => (RuntimeKind::Unset, None),
        };
        RuntimeDescriptor {
            kind,
            state: self.state,
            session,
            container_available: self.container_available,
            local_available: self.local_available,
            verbose: self.verbose,
        }
    }

    fn kind_from_state(&self) -> RuntimeKind {
        match self.state {
            ManagerState::ContainerizedActive => RuntimeKind::Containerized,
            ManagerState::LocalActive => RuntimeKind::Local,
            ManagerState::Unset | ManagerState::Failed => RuntimeKind::Unset,
        }
    }

    /// Tear the active session down (for a container: stop and remove it) and
    /// return to `Unset`. A no-op when nothing is active. On failure the
    /// session stays active.
    pub fn teardown(&mut self) -> Result<(), CoreError> {
        let Some(session) = self.session.clone() else {
            return Ok(());
        };
        validate_transition(self.state, ManagerState::Unset)?;
        session
            .lock()
            .map_err(|_| CoreError::Poisoned)?
            .teardown()?;
        self.session = None;
        self.state = ManagerState::Unset;
        info!("runtime torn down");
        Ok(())
    }
}
