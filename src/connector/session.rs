//! Live state of one wallet-connector backend.
//!
//! A [`ConnectorSession`] owns its connector and a `watch` channel holding
//! the observable [`SessionState`]. Every asynchronous step (activation,
//! deactivation, wallet events) lands as a single atomic state update, so
//! observers never see a half-applied transition. Sessions share nothing with
//! each other: one backend failing never touches another's state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::watch;

use crate::account::ChainProvider;
use crate::connector::{Activation, ActivationArgs, Connector, ConnectorEvent, ConnectorKind};
use crate::error::ConnectorError;
use crate::signer::Signer;

/// Activation lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Disconnected,
    Activating,
    Active,
    Error,
}

/// Observable snapshot of a session.
///
/// `Active` holds exactly when a chain id and at least one account are
/// present; `last_error` is only set in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub kind: ConnectorKind,
    pub activation_state: ActivationState,
    pub chain_id: Option<u64>,
    pub accounts: Vec<String>,
    pub last_error: Option<ConnectorError>,
}

impl SessionState {
    fn disconnected(kind: ConnectorKind) -> Self {
        Self {
            kind,
            activation_state: ActivationState::Disconnected,
            chain_id: None,
            accounts: Vec::new(),
            last_error: None,
        }
    }

    fn begin_activation(&mut self) {
        self.activation_state = ActivationState::Activating;
        self.chain_id = None;
        self.accounts.clear();
        self.last_error = None;
    }

    fn apply_activation(&mut self, activation: Activation) {
        self.activation_state = ActivationState::Active;
        self.chain_id = Some(activation.chain_id);
        self.accounts = activation.accounts;
        self.last_error = None;
    }

    fn fail(&mut self, error: ConnectorError) {
        self.activation_state = ActivationState::Error;
        self.chain_id = None;
        self.accounts.clear();
        self.last_error = Some(error);
    }

    fn reset(&mut self) {
        *self = Self::disconnected(self.kind);
    }

    pub fn is_active(&self) -> bool {
        self.activation_state == ActivationState::Active
    }
}

/// One wallet-connector backend and its observable state.
pub struct ConnectorSession {
    connector: Arc<dyn Connector>,
    state: watch::Sender<SessionState>,
    forwarding: AtomicBool,
}

impl ConnectorSession {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(SessionState::disconnected(connector.kind()));
        Self {
            connector,
            state,
            forwarding: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> ConnectorKind {
        self.connector.kind()
    }

    /// Activate the backend.
    ///
    /// A call made while an activation is already pending is a no-op and
    /// returns `Activating` immediately. Otherwise returns the state the
    /// session settled in once the backend resolved.
    pub async fn activate(&self, args: ActivationArgs) -> ActivationState {
        let kind = self.kind();
        let started = self.state.send_if_modified(|state| {
            if state.activation_state == ActivationState::Activating {
                false
            } else {
                state.begin_activation();
                true
            }
        });
        if !started {
            tracing::debug!(connector = %kind, "Activation already in flight, ignoring");
            return ActivationState::Activating;
        }

        tracing::info!(connector = %kind, "Activating connector");
        let pending = PendingActivation {
            session: self,
            settled: false,
        };

        if let Err(e) = kind.validate_args(&args) {
            return pending.settle(Err(e));
        }

        let result = self.connector.activate(args).await;
        pending.settle(result)
    }

    /// Re-issue activation bound to `chain_id`.
    ///
    /// Returns `None` without touching state when the kind cannot switch
    /// networks.
    pub async fn switch_network(&self, chain_id: u64) -> Option<ActivationState> {
        if !self.kind().capabilities().can_switch_network {
            tracing::warn!(connector = %self.kind(), chain_id, "Connector cannot switch networks");
            return None;
        }
        Some(self.activate(ActivationArgs::Chain { chain_id }).await)
    }

    /// Disconnect the backend.
    ///
    /// Returns `false` (and changes nothing) when the kind cannot deactivate
    /// or the session is not connected.
    pub async fn deactivate(&self) -> bool {
        let kind = self.kind();
        if !kind.capabilities().can_deactivate {
            tracing::warn!(connector = %kind, "Connector does not support deactivation");
            return false;
        }
        if !matches!(
            self.state.borrow().activation_state,
            ActivationState::Active | ActivationState::Error
        ) {
            return false;
        }

        match self.connector.deactivate().await {
            Ok(()) => {
                self.state.send_modify(SessionState::reset);
                tracing::info!(connector = %kind, "Connector deactivated");
                true
            }
            Err(e) => {
                tracing::warn!(connector = %kind, error = %e, "Connector deactivation failed");
                self.state.send_modify(|state| state.fail(e));
                false
            }
        }
    }

    /// Apply a change the wallet reported on its own.
    ///
    /// Events only affect an active session; activation resolution owns the
    /// state while `Activating`.
    pub fn handle_event(&self, event: ConnectorEvent) {
        let kind = self.kind();
        self.state.send_if_modified(|state| {
            if !state.is_active() {
                return false;
            }
            match event {
                ConnectorEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                    tracing::info!(connector = %kind, "Wallet locked, no accounts left");
                    state.reset();
                }
                ConnectorEvent::AccountsChanged(accounts) => {
                    if state.accounts == accounts {
                        return false;
                    }
                    state.accounts = accounts;
                }
                ConnectorEvent::ChainChanged(chain_id) => {
                    if state.chain_id == Some(chain_id) {
                        return false;
                    }
                    tracing::info!(connector = %kind, chain_id, "Wallet switched chain");
                    state.chain_id = Some(chain_id);
                }
                ConnectorEvent::Disconnected => {
                    tracing::info!(connector = %kind, "Wallet disconnected");
                    state.reset();
                }
            }
            true
        });
    }

    fn settle(&self, result: Result<Activation, ConnectorError>) -> ActivationState {
        let kind = self.kind();
        let result = result.and_then(|activation| {
            if activation.accounts.is_empty() {
                Err(ConnectorError::new(
                    "NoAccountsError",
                    "the wallet did not expose any account",
                ))
            } else {
                Ok(activation)
            }
        });

        match result {
            Ok(activation) => {
                tracing::info!(
                    connector = %kind,
                    chain_id = activation.chain_id,
                    accounts = activation.accounts.len(),
                    "Connector active"
                );
                self.state
                    .send_modify(|state| state.apply_activation(activation));
                ActivationState::Active
            }
            Err(e) => {
                tracing::warn!(connector = %kind, error = %e, "Connector activation failed");
                self.state.send_modify(|state| state.fail(e));
                ActivationState::Error
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.state.borrow().chain_id
    }

    pub fn accounts(&self) -> Vec<String> {
        self.state.borrow().accounts.clone()
    }

    pub fn error(&self) -> Option<ConnectorError> {
        self.state.borrow().last_error.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().is_active()
    }

    pub fn is_activating(&self) -> bool {
        self.state.borrow().activation_state == ActivationState::Activating
    }

    /// Chain read access, available while the session is active.
    pub fn provider(&self) -> Option<Arc<dyn ChainProvider>> {
        if self.is_active() {
            self.connector.provider()
        } else {
            None
        }
    }

    /// Signer for one of the session's active accounts.
    pub fn signer(&self, account: &str) -> Option<Arc<dyn Signer>> {
        let owned = self
            .state
            .borrow()
            .accounts
            .iter()
            .any(|a| a.eq_ignore_ascii_case(account));
        if owned && self.is_active() {
            self.connector.signer(account)
        } else {
            None
        }
    }

    /// Signer for the first active account.
    pub fn primary_signer(&self) -> Option<Arc<dyn Signer>> {
        let account = self.state.borrow().accounts.first().cloned()?;
        self.signer(&account)
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding.load(Ordering::Acquire)
    }

    pub(crate) fn forwarding_flag(&self) -> &AtomicBool {
        &self.forwarding
    }
}

/// An activation that has set `Activating` but not yet settled.
///
/// Dropping it unsettled (the activation future was cancelled) moves the
/// session to `Error`, so a later `activate` can retry.
struct PendingActivation<'a> {
    session: &'a ConnectorSession,
    settled: bool,
}

impl PendingActivation<'_> {
    fn settle(mut self, result: Result<Activation, ConnectorError>) -> ActivationState {
        self.settled = true;
        self.session.settle(result)
    }
}

impl Drop for PendingActivation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let kind = self.session.kind();
        tracing::warn!(connector = %kind, "Activation abandoned before the backend resolved");
        self.session.state.send_if_modified(|state| {
            if state.activation_state != ActivationState::Activating {
                return false;
            }
            state.fail(ConnectorError::new(
                "ActivationCancelled",
                "the activation was abandoned before the wallet answered",
            ));
            true
        });
    }
}

impl std::fmt::Debug for ConnectorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorSession")
            .field("state", &*self.state.borrow())
            .field("forwarding", &self.is_forwarding())
            .finish()
    }
}
