#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)]

//! mcp-bigip library: the JSON-RPC bridge between AI agents and F5 BIG-IP
//! management APIs.
//!
//! - `rpc`: JSON-RPC envelope, method set, validation, dispatcher
//! - `client`: BIG-IP iControl REST client
//! - `device`: the `DeviceApi` seam and device-facing types
//! - `routes`: axum HTTP handlers
//! - `config`: configuration loading

pub mod client;
pub mod config;
pub mod device;
pub mod routes;
pub mod rpc;
pub mod state;

// Re-export key types at crate root for convenience.
pub use client::BigIpClient;
pub use config::Config;
pub use device::DeviceApi;
pub use rpc::RpcRouter;
pub use state::AppState;
