//! Interface to the external script execution engine.
//!
//! The engine owns the command language of a script body (`install`,
//! `grant`, `revoke`, `exec`, `act`, `#` comments). This crate only hands it
//! the body, the routing path and an optional context, and asks it where an
//! application lives once the forward went through.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::signer::Signer;

/// Options every engine instance is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Content-addressed-storage gateway used to fetch app metadata.
    pub ipfs_gateway: String,
}

/// Script body in the form the engine accepts for forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript(pub String);

/// Creates engine instances scoped to one organization and signer.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        organization_address: &str,
        signer: Arc<dyn Signer>,
        options: &EngineOptions,
    ) -> Result<Box<dyn ScriptEngine>, EngineError>;
}

/// An engine instance bound to an organization.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Turn a script body into the engine's executable form.
    ///
    /// The default passes the body through untouched.
    fn compile(&self, body: &str) -> Result<CompiledScript, EngineError> {
        Ok(CompiledScript(body.to_string()))
    }

    /// Submit the script routed through `path`, optionally with a context
    /// URL attached to the resulting vote or proposal.
    async fn forward(
        &self,
        script: &CompiledScript,
        path: &[String],
        context: Option<&str>,
    ) -> Result<(), EngineError>;

    /// Address of the application identified by a path segment.
    async fn app(&self, segment: &str) -> Result<String, EngineError>;
}
