//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::rpc::RpcRouter;

/// Shared application state. Holds no per-request or per-device data.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// JSON-RPC dispatcher backed by the device adapter.
    pub rpc: RpcRouter,
}

impl AppState {
    pub fn new(config: Config, rpc: RpcRouter) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            rpc,
        }
    }
}
