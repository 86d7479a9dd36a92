//! Service configuration.
//!
//! Sources, in priority order:
//! 1. Environment variables (see [`env_vars`])
//! 2. config.toml
//! 3. Built-in defaults

use std::collections::HashMap;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Only supported credential decryption method.
pub const DECRYPTION_METHOD_AES_GCM: &str = "AES-256-GCM";

/// Upper bound of decryption key material; shorter keys are stretched.
pub const MAX_DECRYPTION_KEY_BYTES: usize = 32;

/// Environment variable names.
pub mod env_vars {
    pub const BIND: &str = "DEVLINK_BIND";
    pub const DATA_DIR: &str = "DEVLINK_DATA_DIR";
    pub const MAX_DOWNLINK_BYTES: &str = "DEVLINK_MAX_DOWNLINK_BYTES";
    pub const CHANGE_INITIAL_PSK: &str = "DEVLINK_CHANGE_INITIAL_PSK";
}

/// Default values.
pub mod defaults {
    pub const BIND: &str = "0.0.0.0:8080";
    pub const DATA_DIR: &str = "data";
    pub const MAX_DOWNLINK_BYTES: usize = 1024;
    pub const FEEDBACK_HISTORY: usize = 1000;
    pub const INGEST_CHANNEL_CAPACITY: usize = 256;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub message: MessageConfig,
    #[serde(default)]
    pub psk: PskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Recent feedback events kept for inspection.
    #[serde(default = "default_feedback_history")]
    pub feedback_history: usize,
    /// Capacity of the command and credential ingestion channels.
    #[serde(default = "default_ingest_capacity")]
    pub ingest_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the database files, or ":memory:".
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Byte budget of one downlink.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PskConfig {
    /// Rotate the provisioned key right after initial credentials arrive.
    #[serde(default = "default_change_initial_psk")]
    pub change_initial_psk: bool,
    #[serde(default)]
    pub decryption: DecryptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionConfig {
    #[serde(default = "default_method")]
    pub method: String,
    /// Base64 key material per key reference.
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

fn default_bind() -> String {
    defaults::BIND.to_string()
}

fn default_feedback_history() -> usize {
    defaults::FEEDBACK_HISTORY
}

fn default_ingest_capacity() -> usize {
    defaults::INGEST_CHANNEL_CAPACITY
}

fn default_data_dir() -> String {
    defaults::DATA_DIR.to_string()
}

fn default_max_bytes() -> usize {
    defaults::MAX_DOWNLINK_BYTES
}

fn default_change_initial_psk() -> bool {
    true
}

fn default_method() -> String {
    DECRYPTION_METHOD_AES_GCM.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            feedback_history: default_feedback_history(),
            ingest_capacity: default_ingest_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

impl Default for PskConfig {
    fn default() -> Self {
        Self {
            change_initial_psk: default_change_initial_psk(),
            decryption: DecryptionConfig::default(),
        }
    }
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            keys: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from an optional TOML file, then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!(category = "config", path = %path.display(), "Loading config file");
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                Self::from_toml(&content)?
            }
            Some(path) => {
                info!(category = "config", path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup(env_vars::BIND) {
            self.server.bind = bind;
        }
        if let Some(dir) = lookup(env_vars::DATA_DIR) {
            self.storage.data_dir = dir;
        }
        if let Some(max) = lookup(env_vars::MAX_DOWNLINK_BYTES) {
            self.message.max_bytes = max.parse().map_err(|_| {
                Error::Config(format!("{} must be a number, got {}", env_vars::MAX_DOWNLINK_BYTES, max))
            })?;
        }
        if let Some(flag) = lookup(env_vars::CHANGE_INITIAL_PSK) {
            self.psk.change_initial_psk = flag.parse().map_err(|_| {
                Error::Config(format!("{} must be true or false, got {}", env_vars::CHANGE_INITIAL_PSK, flag))
            })?;
        }
        Ok(())
    }

    /// Check value constraints.
    pub fn validate(&self) -> Result<()> {
        if self.message.max_bytes == 0 {
            return Err(Error::Config("message.max_bytes must be greater than 0".to_string()));
        }
        if self.psk.decryption.method != DECRYPTION_METHOD_AES_GCM {
            return Err(Error::Config(format!(
                "unsupported decryption method {}, expected {}",
                self.psk.decryption.method, DECRYPTION_METHOD_AES_GCM
            )));
        }
        for (key_ref, key) in &self.psk.decryption.keys {
            let material = base64::engine::general_purpose::STANDARD
                .decode(key)
                .map_err(|_| Error::Config(format!("decryption key {} is not valid base64", key_ref)))?;
            if material.len() > MAX_DECRYPTION_KEY_BYTES {
                return Err(Error::Config(format!(
                    "decryption key {} is longer than {} bytes",
                    key_ref, MAX_DECRYPTION_KEY_BYTES
                )));
            }
        }
        Ok(())
    }

    /// Whether stores should live in memory only.
    pub fn is_in_memory(&self) -> bool {
        self.storage.data_dir == ":memory:"
    }
}
