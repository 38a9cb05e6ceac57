//! HTTP route handlers.
//!
//! - [`rpc`]: the JSON-RPC endpoint and method discovery
//! - [`health`]: liveness check

pub mod health;
pub mod rpc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Assemble the full HTTP application.
pub fn app(state: AppState) -> Router {
    let rpc_path = state.config.server.rpc_path.clone();
    Router::new()
        .route("/api/health", get(health::health))
        .merge(rpc::router(&rpc_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
