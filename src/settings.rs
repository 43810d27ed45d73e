//! User settings persistence.
//!
//! Settings live in `~/.dao-terminal/config.toml`. Resolution priority is
//! env var > config file > default; see [`crate::config`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Gateway used to resolve app metadata when nothing else is configured.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.blossom.software/ipfs/";

/// User settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// Execution engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Wallet connector settings.
    #[serde(default)]
    pub connectors: ConnectorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineSettings {
    /// Content-addressed-storage gateway base URL.
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,
}

fn default_ipfs_gateway() -> String {
    DEFAULT_IPFS_GATEWAY.to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ipfs_gateway: default_ipfs_gateway(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectorSettings {
    /// Connector backends offered to the user, in display order.
    #[serde(default = "default_enabled_connectors")]
    pub enabled: Vec<String>,

    /// Chain the read-only network connector starts on.
    #[serde(default = "default_chain_id")]
    pub default_chain_id: u64,
}

fn default_enabled_connectors() -> Vec<String> {
    [
        "injected",
        "email_link",
        "safe_app",
        "network",
        "wallet_connect",
        "coinbase_wallet",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_chain_id() -> u64 {
    1
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled_connectors(),
            default_chain_id: default_chain_id(),
        }
    }
}

impl Settings {
    /// Default config file path (`~/.dao-terminal/config.toml`).
    pub fn default_toml_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dao-terminal")
            .join("config.toml")
    }

    /// Load settings from a TOML file. A missing file yields `Ok(None)`.
    pub fn load_toml(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Overlay values from `other` that differ from the defaults.
    pub fn merge_from(&mut self, other: &Settings) {
        let defaults = Settings::default();
        if other.engine.ipfs_gateway != defaults.engine.ipfs_gateway {
            self.engine.ipfs_gateway = other.engine.ipfs_gateway.clone();
        }
        if other.connectors.enabled != defaults.connectors.enabled {
            self.connectors.enabled = other.connectors.enabled.clone();
        }
        if other.connectors.default_chain_id != defaults.connectors.default_chain_id {
            self.connectors.default_chain_id = other.connectors.default_chain_id;
        }
    }

    /// Write settings as TOML, creating the parent directory.
    pub fn save_toml(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("failed to encode settings: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
