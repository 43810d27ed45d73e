//! Signers handed out by connector sessions.
//!
//! A [`Signer`] is an authenticated handle for one account. Wallet backends
//! provide their own; [`LocalKeySigner`] signs with an in-memory secp256k1
//! key for headless use.

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use crate::address::{decode_hex, to_hex};
use crate::error::ConnectorError;

/// Authenticated handle capable of authorizing transactions for one account.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Lowercase `0x`-prefixed address of the account.
    fn address(&self) -> String;

    /// `personal_sign` a message; returns the 65-byte `r || s || v` signature as hex.
    async fn sign_message(&self, message: &[u8]) -> Result<String, ConnectorError>;
}

/// Signer backed by a raw secp256k1 private key.
pub struct LocalKeySigner {
    key: SigningKey,
    address: String,
}

impl LocalKeySigner {
    pub fn from_bytes(secret: &[u8]) -> Result<Self, ConnectorError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| ConnectorError::new("InvalidPrivateKey", e.to_string()))?;
        let address = derive_address(&key);
        Ok(Self { key, address })
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(secret: &str) -> Result<Self, ConnectorError> {
        let bytes = decode_hex(secret.trim()).ok_or_else(|| {
            ConnectorError::new("InvalidPrivateKey", "private key is not valid hex")
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn verifying_key(&self) -> &k256::ecdsa::VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn derive_address(key: &SigningKey) -> String {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", to_hex(&hash[12..]))
}

/// Keccak-256 of the EIP-191 prefixed message.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

#[async_trait]
impl Signer for LocalKeySigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, ConnectorError> {
        let digest = personal_message_hash(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| ConnectorError::new("SigningError", e.to_string()))?;

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", to_hex(&bytes)))
    }
}
