//! Forward pipeline: parse, execute through the engine, compute the redirect.
//!
//! The pipeline never panics on engine failures and never navigates. Every
//! outcome, including parse errors, comes back as an [`ExecutionOutcome`]
//! value that the caller renders or acts on.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde::Serialize;

use crate::address::short_address;
use crate::config::EngineConfig;
use crate::connector::ConnectorSession;
use crate::engine::{EngineFactory, EngineOptions};
use crate::error::{EngineError, FailureClass};
use crate::redirect::RedirectResolver;
use crate::script::{ForwardRequest, ScriptDocument};
use crate::signer::Signer;

const TRANSACTION_FAILED_PREFIX: &str = "transaction failed";
const TRANSACTION_HASH_HEX_LEN: usize = 64;

/// Result of one forward attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The forward went through. `redirect_url` is `None` when the chain has
    /// no known dashboard.
    Success { redirect_url: Option<String> },
    Failure {
        classification: FailureClass,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction_hash: Option<String>,
    },
}

impl ExecutionOutcome {
    fn failure(classification: FailureClass, message: impl Into<String>) -> Self {
        Self::Failure {
            classification,
            message: message.into(),
            transaction_hash: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn classification(&self) -> Option<FailureClass> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { classification, .. } => Some(*classification),
        }
    }
}

/// Classify an error message thrown by the engine.
///
/// A message starting with "transaction failed" that carries a quoted
/// 64-digit hex hash becomes a [`FailureClass::TransactionFailure`] pointing
/// at that hash; anything else is passed through as
/// [`FailureClass::Unknown`].
pub fn classify_engine_error(message: &str) -> ExecutionOutcome {
    match extract_transaction_hash(message) {
        Some(hash) => ExecutionOutcome::Failure {
            classification: FailureClass::TransactionFailure,
            message: format!("Transaction failed, watch in block explorer `{}`", hash),
            transaction_hash: Some(hash),
        },
        None => ExecutionOutcome::failure(FailureClass::Unknown, message),
    }
}

fn extract_transaction_hash(message: &str) -> Option<String> {
    let prefix = message.get(..TRANSACTION_FAILED_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(TRANSACTION_FAILED_PREFIX) {
        return None;
    }

    // Every other piece after the first sits between a pair of quotes; a
    // piece only counts when its closing quote exists.
    let mut pieces = message.split('"').skip(1);
    loop {
        let quoted = pieces.next()?;
        pieces.next()?;
        if is_transaction_hash(quoted) {
            return Some(quoted.to_string());
        }
    }
}

fn is_transaction_hash(value: &str) -> bool {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    digits.len() == TRANSACTION_HASH_HEX_LEN && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Why a forward could not be started from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ForwardUnavailable {
    #[error("a forward is already in flight for this session")]
    InFlight,

    #[error("the session has no active account to sign with")]
    SessionInactive,
}

/// Marks a session as busy forwarding for as long as it lives.
///
/// Dropping the guard clears the flag on every exit path, including early
/// returns and errors raised while the engine is being created.
#[derive(Debug)]
pub struct ForwardGuard {
    session: Arc<ConnectorSession>,
}

impl ForwardGuard {
    /// Claim the session, or `None` if a forward is already in flight.
    pub fn try_begin(session: &Arc<ConnectorSession>) -> Option<Self> {
        session
            .forwarding_flag()
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            session: Arc::clone(session),
        })
    }
}

impl Drop for ForwardGuard {
    fn drop(&mut self) {
        self.session
            .forwarding_flag()
            .store(false, Ordering::Release);
    }
}

/// Runs scripts through the external engine.
pub struct ForwardPipeline {
    factory: Arc<dyn EngineFactory>,
    options: EngineOptions,
    redirects: RedirectResolver,
}

impl ForwardPipeline {
    pub fn new(factory: Arc<dyn EngineFactory>, options: EngineOptions) -> Self {
        Self {
            factory,
            options,
            redirects: RedirectResolver::new(),
        }
    }

    pub fn from_config(factory: Arc<dyn EngineFactory>, config: &EngineConfig) -> Self {
        Self::new(
            factory,
            EngineOptions {
                ipfs_gateway: config.ipfs_gateway.clone(),
            },
        )
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Forward `document` signed by `signer`.
    pub async fn execute(
        &self,
        document: &ScriptDocument,
        signer: Arc<dyn Signer>,
        chain_id: Option<u64>,
    ) -> ExecutionOutcome {
        let request = match document.parse() {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Script header rejected");
                return ExecutionOutcome::failure(e.class(), e.to_string());
            }
        };

        tracing::info!(
            organization = %short_address(&request.organization_address),
            path = %request.path.join(" > "),
            signer = %short_address(&signer.address()),
            chain_id = ?chain_id,
            "Forwarding script"
        );

        let outcome = match self.run(&request, signer, chain_id).await {
            Ok(redirect_url) => ExecutionOutcome::Success { redirect_url },
            Err(e) => classify_engine_error(&e.raw_message()),
        };

        match &outcome {
            ExecutionOutcome::Success { redirect_url } => {
                tracing::info!(redirect = ?redirect_url, "Forward succeeded");
            }
            ExecutionOutcome::Failure {
                classification,
                message,
                transaction_hash,
            } => {
                tracing::warn!(
                    classification = ?classification,
                    transaction_hash = ?transaction_hash,
                    "Forward failed: {}",
                    message
                );
            }
        }
        outcome
    }

    /// Forward from a session's first active account.
    ///
    /// Refuses to start while another forward from the same session is in
    /// flight; sessions never block each other.
    pub async fn execute_for_session(
        &self,
        session: &Arc<ConnectorSession>,
        document: &ScriptDocument,
    ) -> Result<ExecutionOutcome, ForwardUnavailable> {
        let _guard = ForwardGuard::try_begin(session).ok_or(ForwardUnavailable::InFlight)?;
        let signer = session
            .primary_signer()
            .ok_or(ForwardUnavailable::SessionInactive)?;
        let chain_id = session.chain_id();
        Ok(self.execute(document, signer, chain_id).await)
    }

    async fn run(
        &self,
        request: &ForwardRequest,
        signer: Arc<dyn Signer>,
        chain_id: Option<u64>,
    ) -> Result<Option<String>, EngineError> {
        let engine = self
            .factory
            .create(&request.organization_address, signer, &self.options)
            .await?;

        let script = engine.compile(&request.body)?;
        engine
            .forward(&script, &request.path, request.context.as_deref())
            .await?;

        let app_address = engine.app(request.target_app()).await?;
        let redirect =
            self.redirects
                .try_resolve(chain_id, &request.organization_address, &app_address);
        if redirect.is_none() {
            tracing::warn!(chain_id = ?chain_id, "No dashboard known for chain, skipping redirect");
        }
        Ok(redirect)
    }
}
