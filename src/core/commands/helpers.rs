// src/core/commands/helpers.rs

//! Helpers for pulling typed values out of untyped JSON params.

use serde_json::Value;

/// Renders a param as a string. Strings are taken verbatim; other scalars use
/// their JSON text, so a numeric nonce still round-trips.
pub fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns the param at `index` if it is a JSON string.
pub fn string_param(params: &[Value], index: usize) -> Option<&str> {
    params.get(index).and_then(Value::as_str)
}
