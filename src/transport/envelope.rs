//! Response envelope handling.
//!
//! The backend answers either with a bare payload or with
//! `{ "success": bool, "data": T }`. Both keys must be present for the
//! wrapper to be recognised.

use serde_json::Value;

/// Return `data` from a `{success, data}` envelope, or the payload unchanged.
pub fn unwrap_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("success") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Records from a payload that is either an array or `{ "data": [...] }`.
pub fn extract_records(payload: Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}
