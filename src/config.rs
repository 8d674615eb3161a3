//! Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration, loaded from a TOML file. Every field has a default
/// so a partial file still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Capacity limits and timeouts.
    pub limits: LimitsConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Display name of the server.
    pub name: String,
    /// Hostname to bind to.
    pub hostname: String,
    /// Port to bind to. 0 picks an ephemeral port.
    pub port: u16,
    /// Raise the default log filter to `debug`.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "chatterd".to_string(),
            hostname: "localhost".to_string(),
            port: 6660,
            debug: false,
        }
    }
}

/// Capacity limits. Zero means unlimited / disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrent WebSocket sessions.
    pub max_conns: usize,
    /// Maximum number of live rooms.
    pub max_rooms: usize,
    /// Per-read idle deadline in seconds before a client is disconnected.
    pub max_idle_secs: u64,
    /// Capacity of each room's inbound request queue.
    pub room_queue_depth: usize,
    /// Capacity of each chatter's outbound response queue.
    pub chatter_queue_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_conns: 0,
            max_rooms: 0,
            max_idle_secs: 0,
            room_queue_depth: 1000,
            chatter_queue_depth: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
