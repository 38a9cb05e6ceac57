//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::device::SERVICE_NAME;
use crate::AppState;

/// `GET /api/health`: liveness check.
///
/// Reports process health only; it never contacts a device.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE_NAME,
    }))
}
