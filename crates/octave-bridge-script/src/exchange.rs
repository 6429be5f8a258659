//! Decoding of the JSON exchange document written by the save statement.

use crate::request::{InvocationRequest, InvocationResult};
use crate::value::Value;
use crate::DecodeError;

pub fn decode(bytes: &[u8], request: &InvocationRequest) -> Result<InvocationResult, DecodeError> {
    let document: serde_json::Value = serde_json::from_slice(bytes)?;
    let serde_json::Value::Object(mut fields) = document else {
        return Err(DecodeError::NotObject);
    };

    let mut decoded = Vec::new();
    for name in request.saved_vars() {
        let raw = fields
            .remove(name.as_str())
            .ok_or_else(|| DecodeError::MissingVariable(name.to_string()))?;
        let value: Value = serde_json::from_value(raw)?;
        decoded.push((name, value));
    }

    if request.returns_single() {
        if let Some((_, value)) = decoded.pop() {
            return Ok(InvocationResult::Single(value));
        }
    }
    Ok(InvocationResult::Named(decoded))
}
