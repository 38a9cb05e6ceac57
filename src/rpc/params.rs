//! Parameter validation for device-facing methods.
//!
//! Every parameter a method needs is required, must be a string, and must be
//! non-empty. All offending fields are reported together so a caller can fix
//! the request in one round trip.

use serde_json::{Map, Value};

use super::error::RpcError;

/// Parameters shared by every device-facing method.
pub const CREDENTIAL_FIELDS: [&str; 3] = ["host", "username", "password"];

/// Normalize the `params` member: absent or `null` becomes an empty object,
/// anything other than an object is rejected.
pub fn as_object(params: Option<Value>) -> Result<Map<String, Value>, RpcError> {
    match params {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(RpcError::InvalidParams(
            "params must be an object of named parameters".into(),
        )),
    }
}

/// Look up `fields` in order, returning their string values.
///
/// # Errors
///
/// `InvalidParams` naming every field that is absent, empty, or not a string.
pub fn require<'a, const N: usize>(
    params: &'a Map<String, Value>,
    fields: [&str; N],
) -> Result<[&'a str; N], RpcError> {
    let mut values = Vec::with_capacity(N);
    let mut missing = Vec::new();
    let mut mistyped = Vec::new();

    for field in fields {
        match params.get(field) {
            Some(Value::String(s)) if !s.is_empty() => values.push(s.as_str()),
            None | Some(Value::Null | Value::String(_)) => missing.push(field),
            Some(_) => mistyped.push(field),
        }
    }

    if missing.is_empty() && mistyped.is_empty() {
        return values
            .try_into()
            .map_err(|_| RpcError::InvalidParams("parameter count mismatch".into()));
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing or empty: {}", missing.join(", ")));
    }
    if !mistyped.is_empty() {
        parts.push(format!("must be strings: {}", mistyped.join(", ")));
    }
    Err(RpcError::InvalidParams(parts.join("; ")))
}
