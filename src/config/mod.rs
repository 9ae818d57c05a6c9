//! Client Configuration
//!
//! TOML-backed configuration with serde defaults, so an empty file and
//! a missing file both yield a working client listening on the standard
//! TUIO port. Sections:
//!
//! - `[network]`  bind address, UDP port, receive buffer size
//! - `[tracking]` per-entity path history capacity
//! - `[logging]`  level filter and output format

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, TuioError};
use crate::model::DEFAULT_PATH_CAPACITY;

/// The port the TUIO specification reserves.
pub const DEFAULT_TUIO_PORT: u16 = 3333;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// UDP transport settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Entity tracking settings.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// UDP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Local address to bind.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Receive buffer size in bytes. TUIO bundles fit comfortably in
    /// one MTU, but senders may batch frames.
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            bind_addr: default_bind_addr(),
            port: default_port(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

/// Entity tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Samples of movement history kept per entity.
    #[serde(default = "default_path_capacity")]
    pub path_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            path_capacity: default_path_capacity(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level filter, overridable via `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `pretty`, `compact` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_TUIO_PORT
}

fn default_recv_buffer_size() -> usize {
    65536
}

fn default_path_capacity() -> usize {
    DEFAULT_PATH_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ClientConfig {
    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&raw)
            .map_err(|e| TuioError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Checks constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.network.bind_addr.parse::<IpAddr>().is_err() {
            return Err(TuioError::Config(format!(
                "invalid bind address '{}'",
                self.network.bind_addr
            )));
        }
        if self.tracking.path_capacity == 0 {
            return Err(TuioError::Config(
                "tracking.path_capacity must be at least 1".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(TuioError::Config(format!(
                    "unknown logging format '{other}', expected pretty, compact or json"
                )));
            }
        }
        Ok(())
    }

    /// Applies command line overrides on top of file values.
    pub fn with_overrides(mut self, bind_addr: Option<String>, port: Option<u16>) -> Self {
        if let Some(bind_addr) = bind_addr {
            self.network.bind_addr = bind_addr;
        }
        if let Some(port) = port {
            self.network.port = port;
        }
        self
    }
}
