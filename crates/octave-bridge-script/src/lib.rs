//! Script protocol for octave-bridge.
//!
//! This crate is the pure, side-effect-free half of the bridge: typed
//! invocation arguments (`ArgumentValue`) and their lowering to Octave literal
//! syntax, persistent/transient setup statements (`CommandBuffer`), assembly of
//! the script text an interpreter runs (`ScriptBuilder`), and decoding of the
//! JSON exchange document the script writes back (`decode`).

pub mod builder;
pub mod commands;
pub mod exchange;
pub mod marshal;
pub mod request;
pub mod types;
pub mod value;

pub use builder::{GeneratedScript, ScriptBuilder};
pub use commands::{genpath, CommandBuffer};
pub use exchange::decode;
pub use request::{InvocationRequest, InvocationResult};
pub use types::{FunctionName, VarName};
pub use value::{ArgumentValue, NumericArray, Value};

use thiserror::Error;

/// An argument or name that cannot be lowered to Octave syntax. Always a
/// caller bug; never retried.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("unsupported argument type: {type_name}")]
    Unsupported { type_name: String },
    #[error("numeric array shape {shape:?} does not match {len} values")]
    Shape { shape: Vec<usize>, len: usize },
    #[error("numeric array rows have differing lengths")]
    Ragged,
    #[error("invalid {kind} '{name}'")]
    InvalidName { kind: &'static str, name: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("exchange file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("exchange document is not a JSON object")]
    NotObject,
    #[error("exchange document lacks variable '{0}'")]
    MissingVariable(String),
}
