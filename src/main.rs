#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # mcp-bigip
//!
//! JSON-RPC bridge that lets an AI agent drive F5 BIG-IP devices. Each call
//! carries the device address and credentials; the server translates it into
//! iControl REST requests and normalizes the answer.
//!
//! ## Subcommands
//!
//! - `mcp-bigip serve` (default): run the HTTP server
//! - `mcp-bigip call <method>`: send one JSON-RPC request to a running server
//!
//! ## API surface
//!
//! | Method | Path           | Description                         |
//! |--------|----------------|-------------------------------------|
//! | GET    | `/api/health`  | Liveness check                      |
//! | POST   | `/mcp`         | JSON-RPC 2.0 endpoint               |
//! | GET    | `/mcp/methods` | Supported RPC method names          |
//!
//! ## RPC methods
//!
//! | Method               | Description                              |
//! |----------------------|------------------------------------------|
//! | `mcp.list_services`  | Services fronted by this server          |
//! | `bigip.run_command`  | Run a shell command via `/mgmt/tm/util/bash` |
//! | `bigip.get_virtuals` | LTM virtual servers (name, destination)  |
//! | `bigip.get_pools`    | LTM pools and their member names         |

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use mcp_bigip::{routes, AppState, BigIpClient, Config, RpcRouter};

/// JSON-RPC bridge for F5 BIG-IP management.
#[derive(Parser)]
#[command(name = "mcp-bigip", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
    /// Send a single JSON-RPC request to a running server and print the reply.
    Call {
        /// RPC method, e.g. `bigip.get_pools`.
        method: String,
        /// Named parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
        /// Request id.
        #[arg(long, default_value_t = 1)]
        id: u64,
        /// Server endpoint.
        #[arg(long, env = "MCP_URL", default_value = "http://localhost:4000/mcp")]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => run_server(config.as_deref()).await,
        None => run_server(None).await,
        Some(Commands::Call {
            method,
            params,
            id,
            url,
        }) => {
            if let Err(e) = call(&url, &method, &params, id).await {
                eprintln!("mcp-bigip: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-bigip: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("mcp-bigip v{} starting", env!("CARGO_PKG_VERSION"));
    if config.device.accept_invalid_certs {
        warn!("TLS certificate verification is disabled for device connections");
    }

    let client = match BigIpClient::new(&config.device) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build device HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let rpc = RpcRouter::new(Arc::new(client), config.device.member_fetch_concurrency);
    let state = AppState::new(config, rpc);
    let app = routes::app(state.clone());

    let listen = &state.config.server.listen;
    let listener = match TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {listen}: {e}");
            std::process::exit(1);
        }
    };
    info!(
        "Listening on {listen}, JSON-RPC at {}",
        state.config.server.rpc_path
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        std::process::exit(1);
    }
    info!("Goodbye");
}

/// Resolve on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}

/// Post one JSON-RPC request and print the pretty-printed response.
async fn call(url: &str, method: &str, params: &str, id: u64) -> Result<(), String> {
    let params: serde_json::Value =
        serde_json::from_str(params).map_err(|e| format!("Invalid JSON params: {e}"))?;
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });

    let resp = reqwest::Client::new()
        .post(url)
        .json(&payload)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| format!("Request to {url} failed: {e}"))?;
    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| format!("Invalid response from {url}: {e}"))?;

    let pretty = serde_json::to_string_pretty(&body).map_err(|e| e.to_string())?;
    println!("{pretty}");
    Ok(())
}
