//! RPC error type that maps every failure onto a JSON-RPC error object.

use serde_json::Value;

use super::types::{self, RpcResponse};
use crate::client::ClientError;

/// Every way an RPC call can fail. Each variant has exactly one code.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Any failure contacting the device or decoding its reply. The message is
    /// the underlying error's text, unchanged.
    #[error(transparent)]
    Upstream(#[from] ClientError),
}

impl RpcError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Parse(_) => types::PARSE_ERROR,
            RpcError::InvalidRequest(_) => types::INVALID_REQUEST,
            RpcError::MethodNotFound(_) => types::METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => types::INVALID_PARAMS,
            RpcError::Upstream(_) => types::UPSTREAM_FAILURE,
        }
    }

    /// Convert to a JSON-RPC error response.
    pub fn to_response(&self, id: Value) -> RpcResponse {
        RpcResponse::error(id, self.code(), self.to_string())
    }
}
