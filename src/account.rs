//! Per-account label and balance resolution.
//!
//! Every resolution batch is tagged with a generation number taken when the
//! batch starts. Starting a new batch bumps the generation and clears the
//! visible views, so results from a superseded `(provider, accounts)` pair
//! are dropped on arrival instead of overwriting newer data. In-flight
//! provider calls are never aborted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use num_bigint::BigUint;
use serde::{Serialize, Serializer};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::address::short_address;
use crate::connector::ConnectorSession;
use crate::error::ProviderError;

/// Read access to the chain a wallet is connected to.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Reverse-resolve a human readable name for the address, if any.
    async fn lookup_address(&self, address: &str) -> Result<Option<String>, ProviderError>;

    /// Balance in the chain's smallest unit.
    async fn get_balance(&self, address: &str) -> Result<BigUint, ProviderError>;
}

/// Resolved view of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub address: String,
    pub label: Option<String>,
    #[serde(serialize_with = "serialize_balance")]
    pub balance: Option<BigUint>,
}

fn serialize_balance<S: Serializer>(
    balance: &Option<BigUint>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match balance {
        Some(value) => serializer.serialize_some(&value.to_str_radix(10)),
        None => serializer.serialize_none(),
    }
}

/// Resolves [`AccountView`]s for the current `(provider, accounts)` pair.
#[derive(Debug)]
pub struct AccountResolver {
    generation: AtomicU64,
    views: watch::Sender<Option<Vec<AccountView>>>,
}

impl Default for AccountResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountResolver {
    pub fn new() -> Self {
        let (views, _) = watch::channel(None);
        Self {
            generation: AtomicU64::new(0),
            views,
        }
    }

    /// Views of the latest completed batch, or `None` while one is pending.
    pub fn views(&self) -> Option<Vec<AccountView>> {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Vec<AccountView>>> {
        self.views.subscribe()
    }

    /// Start a new batch: invalidate every in-flight batch and clear the
    /// visible views. Returns the token for [`run_batch`](Self::run_batch).
    pub fn begin_batch(&self) -> u64 {
        let token = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.views.send_replace(None);
        token
    }

    /// Resolve every account concurrently and publish the views if `token`
    /// is still the latest batch. Returns whether the results were published.
    pub async fn run_batch(
        &self,
        token: u64,
        provider: Arc<dyn ChainProvider>,
        accounts: Vec<String>,
    ) -> bool {
        let lookups = accounts
            .iter()
            .map(|address| resolve_account(provider.as_ref(), address));
        let resolved = join_all(lookups).await;

        let published = self.views.send_if_modified(|views| {
            if self.generation.load(Ordering::Acquire) != token {
                return false;
            }
            *views = Some(resolved);
            true
        });
        if !published {
            tracing::debug!(batch = token, "Discarding stale account resolution");
        }
        published
    }

    /// Begin and run a batch in one call.
    pub async fn resolve(&self, provider: Arc<dyn ChainProvider>, accounts: Vec<String>) -> bool {
        let token = self.begin_batch();
        self.run_batch(token, provider, accounts).await
    }

    /// Keep the views in sync with a session.
    ///
    /// Whenever the session's chain or account list changes a new batch is
    /// started; the visible views are cleared while the session is inactive.
    /// The task ends when the session is dropped.
    pub fn follow(self: Arc<Self>, session: Arc<ConnectorSession>) -> JoinHandle<()> {
        let mut rx = session.subscribe();
        let session = Arc::downgrade(&session);
        tokio::spawn(async move {
            let mut current: Option<(u64, Vec<String>)> = None;
            loop {
                let next = {
                    let state = rx.borrow_and_update();
                    match (state.is_active(), state.chain_id) {
                        (true, Some(chain_id)) => Some((chain_id, state.accounts.clone())),
                        _ => None,
                    }
                };

                if next != current {
                    let Some(session) = session.upgrade() else {
                        break;
                    };
                    current = next;
                    match (&current, session.provider()) {
                        (Some((_, accounts)), Some(provider)) => {
                            let token = self.begin_batch();
                            let resolver = Arc::clone(&self);
                            let accounts = accounts.clone();
                            tokio::spawn(async move {
                                resolver.run_batch(token, provider, accounts).await;
                            });
                        }
                        _ => {
                            self.begin_batch();
                        }
                    }
                }

                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

async fn resolve_account(provider: &dyn ChainProvider, address: &str) -> AccountView {
    let (label, balance) = futures::join!(
        provider.lookup_address(address),
        provider.get_balance(address)
    );

    let label = label.unwrap_or_else(|e| {
        tracing::debug!(account = %short_address(address), error = %e, "Label lookup failed");
        None
    });
    let balance = balance
        .map_err(|e| {
            tracing::debug!(account = %short_address(address), error = %e, "Balance lookup failed");
        })
        .ok();

    AccountView {
        address: address.to_string(),
        label,
        balance,
    }
}
