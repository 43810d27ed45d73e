//! Command-line interface for `dao-terminal`.
//!
//! The binary has no wallet of its own, so it covers the offline half of the
//! terminal: checking script headers, computing dashboard links, and
//! inspecting the connector catalogue and configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::connector::{ConnectorKind, PayloadShape};
use crate::forward::ExecutionOutcome;
use crate::redirect::RedirectResolver;
use crate::script::ScriptDocument;

#[derive(Parser, Debug)]
#[command(name = "dao-terminal", version, about = "Script terminal for on-chain organizations")]
pub struct Cli {
    /// Path to a TOML config file (defaults to ~/.dao-terminal/config.toml).
    #[arg(long, global = true, env = "DAO_TERMINAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Parse a script file and print the forward request as JSON.
    Parse {
        /// Script file; the first line must be the `connect` header.
        file: PathBuf,
    },
    /// Print the dashboard URL for an application.
    Redirect {
        #[arg(long)]
        chain_id: u64,
        /// Organization address.
        #[arg(long)]
        dao: String,
        /// Application address.
        #[arg(long)]
        app: String,
    },
    /// List the enabled wallet connectors and what they support.
    Connectors,
    /// Print the resolved configuration as JSON.
    Config,
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Parse { file } => run_parse(&file),
        Command::Redirect { chain_id, dao, app } => run_redirect(chain_id, &dao, &app),
        Command::Connectors => {
            let config = load_config(cli.config.as_deref())?;
            run_connectors(&config.connectors.enabled);
            Ok(())
        }
        Command::Config => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Config::from_env_with_toml(path).context("failed to load configuration")
}

fn run_parse(file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document = ScriptDocument::new(text);

    match document.parse() {
        Ok(request) => {
            tracing::debug!(
                organization = %request.organization_address,
                segments = request.path.len(),
                "Parsed script header"
            );
            println!("{}", serde_json::to_string_pretty(&request)?);
            Ok(())
        }
        Err(e) => {
            let outcome = ExecutionOutcome::Failure {
                classification: e.class(),
                message: e.to_string(),
                transaction_hash: None,
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            anyhow::bail!("script header rejected: {e}")
        }
    }
}

fn run_redirect(chain_id: u64, dao: &str, app: &str) -> anyhow::Result<()> {
    match RedirectResolver::new().try_resolve(Some(chain_id), dao, app) {
        Some(url) => {
            println!("{url}");
            Ok(())
        }
        None => anyhow::bail!("no dashboard known for chain {chain_id}"),
    }
}

fn run_connectors(enabled: &[ConnectorKind]) {
    println!("Connectors");
    println!("==========\n");
    for kind in enabled {
        println!("{}", describe_connector(*kind));
    }
}

fn describe_connector(kind: ConnectorKind) -> String {
    let caps = kind.capabilities();
    let flag = |on: bool| if on { "yes" } else { "no" };
    let payload = match kind.payload_shape() {
        PayloadShape::None => "none",
        PayloadShape::EmailCredential => "email",
    };
    format!(
        "  {:<16} {:<18} deactivate: {:<3}  switch network: {:<3}  payload: {}",
        kind.as_str(),
        kind.display_name(),
        flag(caps.can_deactivate),
        flag(caps.can_switch_network),
        payload
    )
}
