//! JSON-RPC endpoint.
//!
//! - `POST <rpc_path>`: one JSON-RPC 2.0 request per call
//! - `GET <rpc_path>/methods`: list the supported method names
//!
//! The endpoint always answers `200 OK`; RPC-level failures travel in the
//! JSON body. The body is read as raw bytes so that malformed JSON becomes a
//! `-32700` response instead of an HTTP rejection.

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::rpc::{RpcResponse, RpcRouter};
use crate::AppState;

pub fn router(rpc_path: &str) -> Router<AppState> {
    Router::new()
        .route(rpc_path, post(rpc_handler))
        .route(&format!("{rpc_path}/methods"), get(list_methods))
}

/// `POST <rpc_path>`: JSON-RPC 2.0 endpoint.
async fn rpc_handler(State(state): State<AppState>, body: Bytes) -> Json<RpcResponse> {
    Json(state.rpc.handle_body(&body).await)
}

/// `GET <rpc_path>/methods`: supported method names.
async fn list_methods() -> Json<Value> {
    Json(json!({ "methods": RpcRouter::method_names() }))
}
