//! dao-terminal: a script terminal for on-chain organizations.
//!
//! A user connects a wallet through one of several connector backends,
//! writes a script whose first line names the organization and the routing
//! path (`connect <dao> <app...> [@context:<url>]`), and forwards it to an
//! external execution engine. The crate owns:
//!
//! - observable connector sessions and the registry that holds them
//! - account metadata resolution with stale-batch protection
//! - script header parsing
//! - the forward pipeline and its outcome classification
//! - dashboard redirect resolution per chain

pub mod account;
pub mod address;
pub mod cli;
pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod forward;
pub mod redirect;
pub mod script;
pub mod settings;
pub mod signer;

pub use account::{AccountResolver, AccountView, ChainProvider};
pub use config::Config;
pub use connector::{
    Activation, ActivationArgs, ActivationState, Connector, ConnectorEvent, ConnectorKind,
    ConnectorSession, SessionRegistry, SessionState,
};
pub use engine::{CompiledScript, EngineFactory, EngineOptions, ScriptEngine};
pub use error::FailureClass;
pub use forward::{ExecutionOutcome, ForwardGuard, ForwardPipeline, ForwardUnavailable};
pub use redirect::RedirectResolver;
pub use script::{ForwardRequest, ScriptDocument};
pub use signer::{LocalKeySigner, Signer};
