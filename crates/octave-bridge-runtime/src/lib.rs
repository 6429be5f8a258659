//! Execution backends for octave-bridge.
//!
//! This crate implements the side-effecting half of the bridge: availability
//! probes for a container engine and a local interpreter, a `ContainerEngine`
//! trait with a Docker CLI implementation and an in-memory mock, and the two
//! `ExecutionSession` implementations (containerized and local) that write a
//! generated script into the shared workspace, run it, and decode the exchange
//! file it leaves behind.

pub mod config;
pub mod container;
pub mod docker;
pub mod engine;
pub mod local;
pub mod mock;
pub mod probe;
pub mod process;
pub mod session;
pub mod workspace;

pub use config::{env_flag, BridgeConfig, CONFIG_FILE_NAME, VERBOSE_ENV};
pub use container::{ensure_container, ensure_image, Attachment, ContainerSession};
pub use docker::DockerCli;
pub use engine::{ContainerEngine, ContainerSpec, ContainerState, ExecOutput, ImageBuild};
pub use local::LocalSession;
pub use mock::MockEngine;
pub use probe::{AvailabilityProbe, Endpoint};
pub use session::{share, BackendKind, ExecutionSession, SharedSession};
pub use workspace::{ExchangeLock, Workspace};

use std::path::PathBuf;
use thiserror::Error;

/// Output lines kept in `Execution` error messages.
pub const OUTPUT_TAIL_LINES: usize = 40;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("failed to build image '{tag}':\n{log}")]
    ImageBuild { tag: String, log: String },
    #[error("container lifecycle error: {0}")]
    ContainerLifecycle(String),
    #[error("container name '{0}' is already in use")]
    NameConflict(String),
    #[error(transparent)]
    Marshal(#[from] octave_bridge_script::MarshalError),
    #[error("execution failed with exit code {code}:\n{}", process::tail(.output, OUTPUT_TAIL_LINES))]
    Execution { code: i32, output: String },
    #[error("result file {} was not written", .path.display())]
    ResultMissing { path: PathBuf },
    #[error("result file {} could not be decoded: {reason}", .path.display())]
    ResultCorrupt { path: PathBuf, reason: String },
    #[error("exchange lock: {0}")]
    Lock(String),
}
