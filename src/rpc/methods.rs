//! The closed set of RPC methods and their handlers.
//!
//! | Method               | Params                                  | Result                         |
//! |----------------------|-----------------------------------------|--------------------------------|
//! | `mcp.list_services`  | none                                    | `["bigip"]`                    |
//! | `bigip.run_command`  | `host`, `username`, `password`, `command` | `{"output": "..."}`          |
//! | `bigip.get_virtuals` | `host`, `username`, `password`          | `[{"name", "destination"}]`    |
//! | `bigip.get_pools`    | `host`, `username`, `password`          | `[{"pool", "members": [...]}]` |

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::error::RpcError;
use super::params::{self, CREDENTIAL_FIELDS};
use crate::device::{Credentials, DeviceApi, Pool, VirtualServer, SERVICE_NAME};

/// Every method the router recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ListServices,
    RunCommand,
    GetVirtuals,
    GetPools,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::ListServices,
        Method::RunCommand,
        Method::GetVirtuals,
        Method::GetPools,
    ];

    /// Wire name of the method.
    pub fn name(self) -> &'static str {
        match self {
            Method::ListServices => "mcp.list_services",
            Method::RunCommand => "bigip.run_command",
            Method::GetVirtuals => "bigip.get_virtuals",
            Method::GetPools => "bigip.get_pools",
        }
    }

    /// Resolve a wire name. `None` for anything outside the closed set.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Result of `bigip.run_command`.
#[derive(Debug, Serialize)]
pub struct CommandOutput {
    /// Captured output, exactly as the device returned it.
    pub output: String,
}

/// `mcp.list_services`: the services this server fronts.
pub fn list_services() -> Vec<&'static str> {
    vec![SERVICE_NAME]
}

/// `bigip.run_command`: execute a shell command on the device.
///
/// The command is passed through untouched; this method is as privileged as
/// the supplied device account.
pub async fn run_command(
    device: &dyn DeviceApi,
    params: &Map<String, Value>,
) -> Result<CommandOutput, RpcError> {
    let [host, username, password, command] = params::require(
        params,
        ["host", "username", "password", "command"],
    )?;
    let creds = Credentials::new(host, username, password);
    info!(host, command, "running remote command");

    let output = device.run_bash(&creds, command).await?;
    Ok(CommandOutput { output })
}

/// `bigip.get_virtuals`: list virtual servers.
pub async fn get_virtuals(
    device: &dyn DeviceApi,
    params: &Map<String, Value>,
) -> Result<Vec<VirtualServer>, RpcError> {
    let creds = credentials(params)?;
    Ok(device.list_virtuals(&creds).await?)
}

/// `bigip.get_pools`: list pools with their member names.
///
/// A failure listing the pools fails the whole call. A failure listing one
/// pool's members does not: that pool is reported with no members and the
/// remaining pools are still fetched. Up to `concurrency` member lookups run
/// at once; results keep the order of the pool listing.
pub async fn get_pools(
    device: &dyn DeviceApi,
    params: &Map<String, Value>,
    concurrency: usize,
) -> Result<Vec<Pool>, RpcError> {
    let creds = credentials(params)?;
    let names = device.list_pool_names(&creds).await?;

    let creds = &creds;
    let pools: Vec<Pool> = stream::iter(names)
        .map(move |name| async move {
            let members = match device.list_pool_members(creds, &name).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(pool = %name, error = %e, "member lookup failed, reporting no members");
                    Vec::new()
                }
            };
            Pool { name, members }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;
    Ok(pools)
}

fn credentials(params: &Map<String, Value>) -> Result<Credentials, RpcError> {
    let [host, username, password] = params::require(params, CREDENTIAL_FIELDS)?;
    Ok(Credentials::new(host, username, password))
}
