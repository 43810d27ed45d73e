//! Error types for dao-terminal.

use serde::{Deserialize, Serialize};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a wallet-connector backend.
///
/// Mirrors the `{name, message}` shape wallets report, so it can be stored
/// verbatim as a session's last error and shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{name}: {message}")]
pub struct ConnectorError {
    pub name: String,
    pub message: String,
}

impl ConnectorError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// The user closed or rejected the wallet prompt.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new("UserRejectedRequestError", message)
    }

    /// The activation payload does not fit the connector kind.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new("InvalidActivationPayload", message)
    }
}

/// Chain-read failures from a provider (label or balance lookups).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Request to provider failed: {0}")]
    Request(String),
}

/// Failures raised by the external script execution engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to create engine for {organization}: {reason}")]
    Create {
        organization: String,
        reason: String,
    },

    #[error("{0}")]
    Execution(String),

    #[error("Unknown application '{0}' in organization")]
    UnknownApp(String),
}

impl EngineError {
    /// Raw message as the engine reported it, without crate prefixes.
    pub fn raw_message(&self) -> String {
        match self {
            Self::Create { reason, .. } => reason.clone(),
            Self::Execution(message) => message.clone(),
            Self::UnknownApp(_) => self.to_string(),
        }
    }
}

/// Structured classification of a failed forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Validation,
    UnsupportedAddressForm,
    TransactionFailure,
    Unknown,
}

/// Script header parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("First line must be `connect <dao> <...path>`")]
    MalformedHeader,

    #[error(
        "ENS names are not supported yet for the DAO address ('{0}'), please use the 0x address"
    )]
    UnsupportedAddressForm(String),
}

impl ScriptError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::MalformedHeader => FailureClass::Validation,
            Self::UnsupportedAddressForm(_) => FailureClass::UnsupportedAddressForm,
        }
    }
}
