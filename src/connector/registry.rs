//! Ordered collection of connector sessions.

use std::sync::Arc;

use crate::connector::{Connector, ConnectorKind, ConnectorSession, SessionState};

/// Holds one [`ConnectorSession`] per configured backend, in display order.
///
/// The registry never mutates sessions itself; each session is driven by its
/// own user interaction and fails independently.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Arc<ConnectorSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from connector backends.
    ///
    /// A second backend of an already registered kind is skipped.
    pub fn from_connectors(connectors: impl IntoIterator<Item = Arc<dyn Connector>>) -> Self {
        let mut registry = Self::new();
        for connector in connectors {
            registry.register(connector);
        }
        registry
    }

    /// Register a backend and return its session.
    pub fn register(&mut self, connector: Arc<dyn Connector>) -> Arc<ConnectorSession> {
        let kind = connector.kind();
        if let Some(existing) = self.get(kind) {
            tracing::warn!(connector = %kind, "Connector already registered, keeping the first");
            return existing;
        }
        let session = Arc::new(ConnectorSession::new(connector));
        self.sessions.push(Arc::clone(&session));
        tracing::debug!(connector = %kind, "Registered connector session");
        session
    }

    pub fn get(&self, kind: ConnectorKind) -> Option<Arc<ConnectorSession>> {
        self.sessions
            .iter()
            .find(|session| session.kind() == kind)
            .cloned()
    }

    pub fn sessions(&self) -> &[Arc<ConnectorSession>] {
        &self.sessions
    }

    /// Sessions currently in the `Active` state.
    pub fn active(&self) -> Vec<Arc<ConnectorSession>> {
        self.sessions
            .iter()
            .filter(|session| session.is_active())
            .cloned()
            .collect()
    }

    /// State of every session, in registration order.
    pub fn snapshot(&self) -> Vec<SessionState> {
        self.sessions.iter().map(|session| session.state()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
