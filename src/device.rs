//! Device-facing types and the [`DeviceApi`] seam.
//!
//! The RPC layer only talks to a device through [`DeviceApi`], which keeps
//! the router free of HTTP details and lets tests substitute a recording
//! stub. [`crate::client::BigIpClient`] is the production implementation.

use futures::future::BoxFuture;
use serde::Serialize;

use crate::client::ClientError;

/// Identifier advertised by `mcp.list_services`, and the prefix of every
/// device-facing method name.
pub const SERVICE_NAME: &str = "bigip";

/// Per-call device credentials, taken from the RPC `params`.
#[derive(Clone)]
pub struct Credentials {
    /// Management address, optionally with `:port`.
    pub host: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

// Hand-written so the password never reaches logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Projection of an LTM virtual server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualServer {
    pub name: String,
    /// `null` when the device record carries no destination.
    pub destination: Option<String>,
}

/// An LTM pool with the names of its members, in device order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pool {
    #[serde(rename = "pool")]
    pub name: String,
    pub members: Vec<String>,
}

/// Raw device operations used by the RPC methods.
///
/// Each call is independent: credentials are passed every time and nothing
/// is cached between calls.
pub trait DeviceApi: Send + Sync {
    /// `POST /mgmt/tm/util/bash`: run `command` through `bash -c` and return
    /// the captured output unmodified.
    fn run_bash<'a>(
        &'a self,
        creds: &'a Credentials,
        command: &'a str,
    ) -> BoxFuture<'a, Result<String, ClientError>>;

    /// `GET /mgmt/tm/ltm/virtual`: all virtual servers in device order.
    fn list_virtuals<'a>(
        &'a self,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Vec<VirtualServer>, ClientError>>;

    /// `GET /mgmt/tm/ltm/pool`: pool names in device order.
    fn list_pool_names<'a>(
        &'a self,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Vec<String>, ClientError>>;

    /// `GET /mgmt/tm/ltm/pool/<pool>/members`: member names of one pool.
    fn list_pool_members<'a>(
        &'a self,
        creds: &'a Credentials,
        pool: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ClientError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pool_serializes_name_as_pool() {
        let pool = Pool {
            name: "web-pool".into(),
            members: vec!["10.0.0.1:80".into()],
        };
        assert_eq!(
            serde_json::to_value(&pool).unwrap(),
            json!({"pool": "web-pool", "members": ["10.0.0.1:80"]})
        );
    }

    #[test]
    fn missing_destination_serializes_as_null() {
        let vs = VirtualServer {
            name: "vs_http".into(),
            destination: None,
        };
        assert_eq!(
            serde_json::to_value(&vs).unwrap(),
            json!({"name": "vs_http", "destination": null})
        );
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials {
            host: "10.1.1.245".into(),
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("10.1.1.245"));
        assert!(!rendered.contains("hunter2"));
    }
}
