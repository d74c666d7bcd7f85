//! Server configuration
//!
//! Defaults can be overridden by a JSON file named in `CHATROOM_CONFIG`;
//! fields missing from the file keep their defaults.

use std::path::Path;

use serde::Deserialize;

use crate::codec::{ServerCodec, DEFAULT_MAX_FRAME_LENGTH};
use crate::error::ConfigError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:9988";

/// Channel buffer size for server commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CHATROOM_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the listener binds to
    pub bind_addr: String,
    /// Largest accepted frame payload, in bytes
    pub max_frame_length: usize,
    /// Capacity of the dispatcher's command queue
    pub command_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from `CHATROOM_CONFIG` if set, otherwise use defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Frame codec honoring `max_frame_length`
    pub fn codec(&self) -> ServerCodec {
        ServerCodec::new(self.max_frame_length)
    }
}
