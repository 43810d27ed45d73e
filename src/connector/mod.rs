//! Wallet-connector backends and their live sessions.
//!
//! Every backend is a black box behind the [`Connector`] trait. What differs
//! between backends (display name, which affordances exist, what the
//! activation payload looks like) is a pure function of [`ConnectorKind`],
//! never of the concrete connector type.

pub mod registry;
pub mod session;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::account::ChainProvider;
use crate::error::ConnectorError;
use crate::signer::Signer;

pub use self::registry::SessionRegistry;
pub use self::session::{ActivationState, ConnectorSession, SessionState};

/// Supported wallet-connector backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// Browser extension wallet injected into the page.
    Injected,
    /// Experimental: email-link custodial wallet with interactive enrollment.
    EmailLink,
    /// Experimental: multisig app hosting this one in an iframe.
    SafeApp,
    /// Read-only RPC connection without accounts of its own.
    Network,
    WalletConnect,
    CoinbaseWallet,
}

/// What a connector kind is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_activate: bool,
    pub can_deactivate: bool,
    pub can_switch_network: bool,
}

/// Shape of the payload a kind expects on `activate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    None,
    EmailCredential,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 6] = [
        Self::Injected,
        Self::EmailLink,
        Self::SafeApp,
        Self::Network,
        Self::WalletConnect,
        Self::CoinbaseWallet,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Injected => "MetaMask",
            Self::EmailLink => "Magic (experimental)",
            Self::SafeApp => "Gnosis Safe (experimental)",
            Self::Network => "Network",
            Self::WalletConnect => "WalletConnect",
            Self::CoinbaseWallet => "Coinbase Wallet",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        let (can_deactivate, can_switch_network) = match self {
            Self::Injected => (false, true),
            Self::EmailLink => (true, false),
            Self::SafeApp => (false, false),
            Self::Network => (false, true),
            Self::WalletConnect => (true, true),
            Self::CoinbaseWallet => (true, true),
        };
        Capabilities {
            can_activate: true,
            can_deactivate,
            can_switch_network,
        }
    }

    pub fn payload_shape(self) -> PayloadShape {
        match self {
            Self::EmailLink => PayloadShape::EmailCredential,
            _ => PayloadShape::None,
        }
    }

    /// Stable identifier used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Injected => "injected",
            Self::EmailLink => "email_link",
            Self::SafeApp => "safe_app",
            Self::Network => "network",
            Self::WalletConnect => "wallet_connect",
            Self::CoinbaseWallet => "coinbase_wallet",
        }
    }

    /// Check an activation payload against this kind's payload shape.
    pub fn validate_args(self, args: &ActivationArgs) -> Result<(), ConnectorError> {
        match (self.payload_shape(), args) {
            (PayloadShape::EmailCredential, ActivationArgs::Email { email }) => {
                if email.trim().is_empty() || !email.contains('@') {
                    return Err(ConnectorError::invalid_payload(format!(
                        "'{}' is not a valid email address",
                        email
                    )));
                }
                Ok(())
            }
            (PayloadShape::EmailCredential, _) => Err(ConnectorError::invalid_payload(format!(
                "{} requires an email address to activate",
                self.display_name()
            ))),
            (PayloadShape::None, ActivationArgs::Email { .. }) => {
                Err(ConnectorError::invalid_payload(format!(
                    "{} does not take an email address",
                    self.display_name()
                )))
            }
            (PayloadShape::None, _) => Ok(()),
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "injected" | "metamask" | "browser_extension" => Ok(Self::Injected),
            "email_link" | "magic" | "email" => Ok(Self::EmailLink),
            "safe_app" | "safe" | "gnosis_safe" => Ok(Self::SafeApp),
            "network" => Ok(Self::Network),
            "wallet_connect" | "walletconnect" => Ok(Self::WalletConnect),
            "coinbase_wallet" | "coinbase" | "walletlink" => Ok(Self::CoinbaseWallet),
            other => Err(format!("unknown connector '{}'", other)),
        }
    }
}

/// Payload passed to [`Connector::activate`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivationArgs {
    #[default]
    None,
    /// Interactive enrollment credential for email-link wallets.
    Email { email: String },
    /// Activate bound to a specific chain (network switch).
    Chain { chain_id: u64 },
}

/// Successful activation result reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub chain_id: u64,
    pub accounts: Vec<String>,
}

/// Change notifications a connected wallet may emit on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    Disconnected,
}

/// A wallet-connector backend.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> ConnectorKind;

    /// Connect the wallet. Resolves once the user approved (or rejected).
    async fn activate(&self, args: ActivationArgs) -> Result<Activation, ConnectorError>;

    /// Disconnect the wallet. Only called for kinds that can deactivate.
    async fn deactivate(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Read access to the chain the wallet is connected to.
    fn provider(&self) -> Option<Arc<dyn ChainProvider>>;

    /// Signer bound to one of the active accounts.
    fn signer(&self, account: &str) -> Option<Arc<dyn Signer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_can_activate() {
        for kind in ConnectorKind::ALL {
            assert!(kind.capabilities().can_activate, "{kind}");
        }
    }

    #[test]
    fn only_email_link_takes_a_credential() {
        for kind in ConnectorKind::ALL {
            let expected = if kind == ConnectorKind::EmailLink {
                PayloadShape::EmailCredential
            } else {
                PayloadShape::None
            };
            assert_eq!(kind.payload_shape(), expected);
        }
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("MetaMask".parse(), Ok(ConnectorKind::Injected));
        assert_eq!("magic".parse(), Ok(ConnectorKind::EmailLink));
        assert_eq!("gnosis-safe".parse(), Ok(ConnectorKind::SafeApp));
        assert_eq!("walletlink".parse(), Ok(ConnectorKind::CoinbaseWallet));
        assert!("ledger".parse::<ConnectorKind>().is_err());
    }

    #[test]
    fn as_str_round_trips_through_from_str() {
        for kind in ConnectorKind::ALL {
            assert_eq!(kind.as_str().parse(), Ok(kind));
        }
    }

    #[test]
    fn email_link_requires_email_payload() {
        let kind = ConnectorKind::EmailLink;
        assert!(kind.validate_args(&ActivationArgs::None).is_err());
        assert!(
            kind.validate_args(&ActivationArgs::Email {
                email: "not-an-email".to_string()
            })
            .is_err()
        );
        assert!(
            kind.validate_args(&ActivationArgs::Email {
                email: "me@example.com".to_string()
            })
            .is_ok()
        );
    }

    #[test]
    fn other_kinds_reject_email_payload() {
        let err = ConnectorKind::Injected
            .validate_args(&ActivationArgs::Email {
                email: "me@example.com".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.name, "InvalidActivationPayload");
        assert!(
            ConnectorKind::Network
                .validate_args(&ActivationArgs::Chain { chain_id: 4 })
                .is_ok()
        );
    }
}
