//! Runtime selection and lifecycle for octave-bridge.
//!
//! This crate ties the availability probes and execution sessions of
//! `octave-bridge-runtime` into the `RuntimeManager`: the preference-ordered
//! fallback policy that picks exactly one backend, the installation guide
//! produced when none is usable, the manager state machine, an explicit
//! registry of named managers, and interrupt handling for the CLI.

pub mod concurrency;
pub mod guide;
pub mod lifecycle;
pub mod manager;
pub mod provider;
pub mod registry;

pub use concurrency::{install_signal_handler, interrupt_requested};
pub use guide::installation_guide;
pub use lifecycle::{validate_transition, ManagerState};
pub use manager::{RuntimeDescriptor, RuntimeKind, RuntimeManager};
pub use provider::{BackendProvider, SystemBackends};
pub use registry::{SessionRegistry, SharedManager};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Neither backend could be used; the message is the installation guide.
    #[error("{0}")]
    Unavailable(String),
    #[error("runtime error: {0}")]
    Runtime(#[from] octave_bridge_runtime::RuntimeError),
    #[error("invalid argument: {0}")]
    Marshal(#[from] octave_bridge_script::MarshalError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("no runtime initialized; call initialize first")]
    NotInitialized,
    #[error("session lock poisoned by a panicked invocation")]
    Poisoned,
}
