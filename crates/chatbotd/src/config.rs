//! Server configuration.
//!
//! Every field has a default so a config file only needs to name what it
//! changes:
//!
//! ```toml
//! port = 6000
//! max_clients = 20
//! idle_timeout_ms = 60000
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5555;

/// Default maximum number of concurrent clients
pub const DEFAULT_MAX_CLIENTS: usize = 100;

/// Runtime configuration for the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind_address: IpAddr,

    /// Port used when none is given at start
    pub port: u16,

    /// Capacity bound on concurrent sessions
    pub max_clients: usize,

    /// Inactivity after which a session is closed
    pub idle_timeout_ms: u64,

    /// Bound on every outbound line write
    pub write_timeout_ms: u64,

    /// Bound on the "server full" write to a rejected connection
    pub reject_timeout_ms: u64,

    /// Lower bound of the cosmetic reply delay
    pub reply_delay_min_ms: u64,

    /// Upper bound of the cosmetic reply delay
    pub reply_delay_max_ms: u64,

    /// How long shutdown waits for session workers
    pub shutdown_grace_ms: u64,

    /// Directory `@save` writes log files into
    pub save_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            idle_timeout_ms: 30_000,
            write_timeout_ms: 5_000,
            reject_timeout_ms: 1_000,
            reply_delay_min_ms: 500,
            reply_delay_max_ms: 1_000,
            shutdown_grace_ms: 5_000,
            save_dir: PathBuf::from("."),
        }
    }
}

impl ServerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file. A missing file is an error here.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads the per-user config file if present, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if self.reply_delay_min_ms > self.reply_delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "reply_delay_min_ms ({}) exceeds reply_delay_max_ms ({})",
                self.reply_delay_min_ms, self.reply_delay_max_ms
            )));
        }
        Ok(())
    }

    /// Socket address for the given port on the configured interface.
    pub fn listen_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_address, port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn reject_timeout(&self) -> Duration {
        Duration::from_millis(self.reject_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Inclusive reply delay bounds in milliseconds.
    pub fn reply_delay_ms(&self) -> (u64, u64) {
        (self.reply_delay_min_ms, self.reply_delay_max_ms)
    }
}

/// `$XDG_CONFIG_HOME/chatbot/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatbot").join("config.toml"))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
