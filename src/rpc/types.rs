//! JSON-RPC 2.0 envelope types.
//!
//! Defined without reference to any HTTP framework so the router can be
//! driven from axum handlers and tests alike.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Server-defined code for any failure talking to the device.
pub const UPSTREAM_FAILURE: i64 = -32000;

/// JSON-RPC 2.0 request object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Carried for completeness; its value is not checked.
    #[serde(default)]
    pub jsonrpc: Option<Value>,
    /// Opaque correlation id (number, string or null), echoed verbatim.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name, e.g. `"bigip.get_pools"`.
    pub method: String,
    /// Named parameters. May be omitted.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response: exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    /// Echoed from the request, `null` when it could not be recovered.
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Payload half of an [`RpcResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Build an error response.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            outcome: Outcome::Error(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }

    /// The error object, if this is an error response.
    pub fn error_object(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Error(e) => Some(e),
            Outcome::Result(_) => None,
        }
    }

    /// The result value, if this is a success response.
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }
}
