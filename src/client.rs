//! HTTP client for the BIG-IP iControl REST API.
//!
//! [`BigIpClient`] wraps `reqwest::Client` and implements [`DeviceApi`] with
//! one typed method per management endpoint. The client holds no device
//! state: host and credentials arrive with every call.
//!
//! ## Authentication
//!
//! Every request uses HTTP Basic authentication with the caller's
//! credentials. Certificate verification is disabled by default because
//! devices typically present self-signed certificates.
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for a `message` field in the JSON body (the
//! iControl error shape). If parsing fails, the raw response body is used as
//! the error message.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::device::{Credentials, DeviceApi, VirtualServer};

/// HTTP client for BIG-IP management endpoints.
#[derive(Clone)]
pub struct BigIpClient {
    http: reqwest::Client,
    scheme: String,
}

/// Body of `POST /mgmt/tm/util/bash`.
#[derive(Deserialize)]
struct BashResult {
    /// Omitted by the device when the command printed nothing.
    #[serde(rename = "commandResult", default)]
    command_result: String,
}

/// Any iControl collection. `items` is omitted when the collection is empty.
#[derive(Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct NamedItem {
    name: String,
}

/// Pool member record. A member without a name is skipped rather than
/// failing the whole pool.
#[derive(Deserialize)]
struct MemberItem {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct VirtualItem {
    name: String,
    #[serde(default)]
    destination: Option<String>,
}

impl BigIpClient {
    /// Build a client from the `[device]` configuration section.
    pub fn new(config: &DeviceConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ClientError::Request)?;
        Ok(Self {
            http,
            scheme: config.scheme.clone(),
        })
    }

    /// Build `{scheme}://{host}/<segments...>`.
    ///
    /// `host` must be a bare authority (`name` or `name:port`); anything that
    /// would smuggle in a path, query or userinfo is rejected.
    fn endpoint(&self, host: &str, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let invalid = || ClientError::Protocol(format!("Invalid device host: {host:?}"));
        let mut url = reqwest::Url::parse(&format!("{}://{}", self.scheme, host))
            .map_err(|e| ClientError::Protocol(format!("Invalid device host {host:?}: {e}")))?;
        if url.path() != "/"
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return Err(invalid());
        }
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `POST /mgmt/tm/util/bash` with `utilCmdArgs = "-c '<command>'"`.
    ///
    /// The command is interpolated as-is. Quoting and allow-listing are the
    /// caller's responsibility.
    pub async fn bash(&self, creds: &Credentials, command: &str) -> Result<String, ClientError> {
        let url = self.endpoint(&creds.host, &["mgmt", "tm", "util", "bash"])?;
        let body = serde_json::json!({
            "command": "run",
            "utilCmdArgs": format!("-c '{command}'"),
        });
        debug!(%url, "POST bash");

        let req = self
            .http
            .post(url)
            .basic_auth(&creds.username, Some(&creds.password))
            .json(&body);
        let result: BashResult = Self::send(req).await?;
        Ok(result.command_result)
    }

    /// `GET /mgmt/tm/ltm/virtual?expandSubcollections=true`.
    pub async fn virtuals(&self, creds: &Credentials) -> Result<Vec<VirtualServer>, ClientError> {
        let mut url = self.endpoint(&creds.host, &["mgmt", "tm", "ltm", "virtual"])?;
        url.query_pairs_mut()
            .append_pair("expandSubcollections", "true");
        let collection: Collection<VirtualItem> = self.get(url, creds).await?;
        Ok(collection
            .items
            .into_iter()
            .map(|v| VirtualServer {
                name: v.name,
                destination: v.destination,
            })
            .collect())
    }

    /// `GET /mgmt/tm/ltm/pool?expandSubcollections=true`, names only.
    pub async fn pool_names(&self, creds: &Credentials) -> Result<Vec<String>, ClientError> {
        let mut url = self.endpoint(&creds.host, &["mgmt", "tm", "ltm", "pool"])?;
        url.query_pairs_mut()
            .append_pair("expandSubcollections", "true");
        let collection: Collection<NamedItem> = self.get(url, creds).await?;
        Ok(collection.items.into_iter().map(|p| p.name).collect())
    }

    /// `GET /mgmt/tm/ltm/pool/<pool>/members`, names only.
    pub async fn pool_members(
        &self,
        creds: &Credentials,
        pool: &str,
    ) -> Result<Vec<String>, ClientError> {
        let url = self.endpoint(&creds.host, &["mgmt", "tm", "ltm", "pool", pool, "members"])?;
        let collection: Collection<MemberItem> = self.get(url, creds).await?;
        Ok(collection.items.into_iter().filter_map(|m| m.name).collect())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: reqwest::Url,
        creds: &Credentials,
    ) -> Result<T, ClientError> {
        debug!(%url, "GET");
        let req = self
            .http
            .get(url)
            .basic_auth(&creds.username, Some(&creds.password));
        Self::send(req).await
    }

    /// Send a request and decode the body. Returns the typed JSON body on
    /// success, or a [`ClientError`] carrying the device's message on failure.
    async fn send<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, ClientError> {
        let resp = req.send().await.map_err(ClientError::Request)?;
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::Request)?;

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|e| ClientError::Protocol(format!("Invalid JSON from device: {e}")))
        } else {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["message"].as_str().map(String::from))
                .unwrap_or(body);
            Err(ClientError::Device {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl DeviceApi for BigIpClient {
    fn run_bash<'a>(
        &'a self,
        creds: &'a Credentials,
        command: &'a str,
    ) -> BoxFuture<'a, Result<String, ClientError>> {
        self.bash(creds, command).boxed()
    }

    fn list_virtuals<'a>(
        &'a self,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Vec<VirtualServer>, ClientError>> {
        self.virtuals(creds).boxed()
    }

    fn list_pool_names<'a>(
        &'a self,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Vec<String>, ClientError>> {
        self.pool_names(creds).boxed()
    }

    fn list_pool_members<'a>(
        &'a self,
        creds: &'a Credentials,
        pool: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ClientError>> {
        self.pool_members(creds, pool).boxed()
    }
}

/// Errors returned by [`BigIpClient`] methods.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, TLS, DNS failure, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// The device returned a non-2xx HTTP status.
    #[error("Device error (HTTP {status}): {message}")]
    Device { status: u16, message: String },
    /// The request could not be built, or the response did not have the
    /// expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
