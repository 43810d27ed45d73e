//! Configuration for dao-terminal.
//!
//! Settings are loaded with priority: env var > TOML config file > default.

pub(crate) mod helpers;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::connector::ConnectorKind;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Main configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub connectors: ConnectorsConfig,
}

/// Execution engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// Content-addressed-storage gateway, always an https URL.
    pub ipfs_gateway: String,
}

impl EngineConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let ipfs_gateway = helpers::optional_env("DAO_TERMINAL_IPFS_GATEWAY")?
            .unwrap_or_else(|| settings.engine.ipfs_gateway.clone());
        validate_gateway(&ipfs_gateway, "DAO_TERMINAL_IPFS_GATEWAY")?;

        Ok(Self { ipfs_gateway })
    }
}

fn validate_gateway(raw: &str, key: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("must be a valid URL: {e}"),
    })?;
    if parsed.scheme() != "https" {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must use https, got '{}'", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must include a host".to_string(),
        });
    }
    Ok(())
}

/// Wallet connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorsConfig {
    /// Backends offered to the user, deduplicated, in configured order.
    pub enabled: Vec<ConnectorKind>,
    /// Chain the read-only network connector starts on.
    pub default_chain_id: u64,
}

impl ConnectorsConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let enabled = match helpers::optional_env("DAO_TERMINAL_CONNECTORS")? {
            Some(raw) => parse_connector_list(
                raw.split(',').map(str::trim).filter(|s| !s.is_empty()),
                "DAO_TERMINAL_CONNECTORS",
            )?,
            None => parse_connector_list(
                settings.connectors.enabled.iter().map(String::as_str),
                "connectors.enabled",
            )?,
        };
        if enabled.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "DAO_TERMINAL_CONNECTORS".to_string(),
                message: "at least one connector must be enabled".to_string(),
            });
        }

        let default_chain_id = helpers::optional_env("DAO_TERMINAL_DEFAULT_CHAIN_ID")?
            .map(|s| s.trim().parse::<u64>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "DAO_TERMINAL_DEFAULT_CHAIN_ID".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?
            .unwrap_or(settings.connectors.default_chain_id);
        if default_chain_id == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DAO_TERMINAL_DEFAULT_CHAIN_ID".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        Ok(Self {
            enabled,
            default_chain_id,
        })
    }
}

fn parse_connector_list<'a>(
    names: impl Iterator<Item = &'a str>,
    key: &str,
) -> Result<Vec<ConnectorKind>, ConfigError> {
    let mut kinds = Vec::new();
    for name in names {
        let kind = helpers::normalize_variant(name)
            .parse::<ConnectorKind>()
            .map_err(|message| ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

impl Config {
    /// Load configuration from environment variables and the default TOML
    /// file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_toml(None)
    }

    /// Load from env with an optional TOML config file overlay.
    pub fn from_env_with_toml(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut settings = Settings::default();
        Self::apply_toml_overlay(&mut settings, toml_path)?;
        Self::resolve(&settings)
    }

    /// Resolve env overrides on top of already-loaded settings.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: EngineConfig::resolve(settings)?,
            connectors: ConnectorsConfig::resolve(settings)?,
        })
    }

    /// Load and merge a TOML config file into settings.
    ///
    /// If `explicit_path` is `Some`, loads from that path (errors are fatal).
    /// If `None`, tries `~/.dao-terminal/config.toml` (missing file is
    /// silently ignored).
    fn apply_toml_overlay(
        settings: &mut Settings,
        explicit_path: Option<&Path>,
    ) -> Result<(), ConfigError> {
        let path = explicit_path
            .map(PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(toml_settings)) => {
                settings.merge_from(&toml_settings);
                tracing::debug!("Loaded TOML config from {}", path.display());
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
            }
        }
        Ok(())
    }
}
