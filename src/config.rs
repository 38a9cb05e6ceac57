//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables**: `MCP_BIGIP_LISTEN`, `MCP_BIGIP_DEVICE_SCHEME`
//! 2. **Config file**: path via `--config <path>`, or `mcp-bigip.toml` in CWD
//! 3. **Compiled defaults**: see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:4000"
//! rpc_path = "/mcp"
//!
//! [device]
//! scheme = "https"
//! accept_invalid_certs = true
//! connect_timeout_secs = 10
//! timeout_secs = 30
//! member_fetch_concurrency = 1
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Device credentials are deliberately absent: every RPC call carries its own
//! `host`, `username` and `password`.

use std::path::Path;

use serde::Deserialize;

/// Default config file looked up in the current directory.
const DEFAULT_CONFIG_FILE: &str = "mcp-bigip.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:4000`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Path of the JSON-RPC endpoint (default `/mcp`).
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
}

/// Settings for outbound calls to the device management API.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// URL scheme used to reach devices (default `https`).
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Skip TLS certificate verification (default true, devices ship
    /// self-signed certificates).
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    /// TCP connect timeout in seconds (default 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (default 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of pool member lookups in flight at once (default 1).
    #[serde(default = "default_member_fetch_concurrency")]
    pub member_fetch_concurrency: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:4000".to_string()
}
fn default_rpc_path() -> String {
    "/mcp".to_string()
}
fn default_scheme() -> String {
    "https".to_string()
}
fn default_accept_invalid_certs() -> bool {
    true
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_member_fetch_concurrency() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            rpc_path: default_rpc_path(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            accept_invalid_certs: default_accept_invalid_certs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
            member_fetch_concurrency: default_member_fetch_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Errors raised while loading configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `mcp-bigip.toml` in
    /// the current directory is used when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Config::default(),
        };

        if let Ok(listen) = std::env::var("MCP_BIGIP_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(scheme) = std::env::var("MCP_BIGIP_DEVICE_SCHEME") {
            config.device.scheme = scheme;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document into a config (no env overrides, no validation).
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Reject settings that would make the service unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.device.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "device.scheme must be \"http\" or \"https\", got {:?}",
                self.device.scheme
            )));
        }
        if self.device.member_fetch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "device.member_fetch_concurrency must be at least 1".into(),
            ));
        }
        if !self.server.rpc_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.rpc_path must start with '/', got {:?}",
                self.server.rpc_path
            )));
        }
        if self.server.rpc_path.len() > 1 && self.server.rpc_path.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.rpc_path must not end with '/', got {:?}",
                self.server.rpc_path
            )));
        }
        if self.server.rpc_path == "/" {
            return Err(ConfigError::Invalid(
                "server.rpc_path must not be the root path".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_missing() {
        let config = Config::from_toml("", "inline").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:4000");
        assert_eq!(config.server.rpc_path, "/mcp");
        assert_eq!(config.device.scheme, "https");
        assert!(config.device.accept_invalid_certs);
        assert_eq!(config.device.member_fetch_concurrency, 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = Config::from_toml(
            "[device]\ntimeout_secs = 5\nmember_fetch_concurrency = 4\n",
            "inline",
        )
        .unwrap();
        assert_eq!(config.device.timeout_secs, 5);
        assert_eq!(config.device.member_fetch_concurrency, 4);
        assert_eq!(config.device.connect_timeout_secs, 10);
        assert_eq!(config.device.scheme, "https");
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config =
            Config::from_toml("[device]\nmember_fetch_concurrency = 0\n", "inline").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_scheme_rejected() {
        let config = Config::from_toml("[device]\nscheme = \"ftp\"\n", "inline").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("device.scheme"));
    }

    #[test]
    fn root_or_trailing_slash_rpc_path_rejected() {
        for path in ["/", "/mcp/", "mcp"] {
            let config =
                Config::from_toml(&format!("[server]\nrpc_path = {path:?}\n"), "inline").unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("server.rpc_path"), "{path}");
        }
        let nested = Config::from_toml("[server]\nrpc_path = \"/api/mcp\"\n", "inline").unwrap();
        assert!(nested.validate().is_ok());
    }

    #[test]
    fn malformed_toml_reports_origin() {
        let err = Config::from_toml("[server\nlisten = 1", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
