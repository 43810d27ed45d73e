//! End-to-end coverage for connector sessions, account resolution and the
//! forward pipeline, driven through the public API with in-memory backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use pretty_assertions::assert_eq;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use dao_terminal::error::{ConnectorError, EngineError, ProviderError};
use dao_terminal::settings::Settings;
use dao_terminal::{
    Activation, ActivationArgs, ActivationState, AccountResolver, AccountView, ChainProvider,
    CompiledScript, Connector, ConnectorEvent, ConnectorKind, EngineFactory, EngineOptions,
    Config, ExecutionOutcome, FailureClass, ForwardPipeline, ForwardUnavailable, LocalKeySigner,
    ScriptDocument, ScriptEngine, SessionRegistry, Signer,
};

const DAO: &str = "0x1234567890abcdef1234567890abcdef12345678";
const APP: &str = "0x00000000000000000000000000000000000000a1";
const WAIT: Duration = Duration::from_secs(5);

struct StaticProvider {
    labels: HashMap<String, String>,
}

#[async_trait]
impl ChainProvider for StaticProvider {
    async fn lookup_address(&self, address: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.labels.get(address).cloned())
    }

    async fn get_balance(&self, address: &str) -> Result<BigUint, ProviderError> {
        if self.labels.contains_key(address) {
            Ok(BigUint::from(10u64).pow(18))
        } else {
            Err(ProviderError::Request("node unreachable".to_string()))
        }
    }
}

/// Wallet backed by local keys; activation exposes every key's address.
struct KeyWallet {
    kind: ConnectorKind,
    chain_id: u64,
    signers: Vec<Arc<LocalKeySigner>>,
    provider: Arc<StaticProvider>,
}

impl KeyWallet {
    fn new(kind: ConnectorKind, secrets: &[u8]) -> Self {
        let signers: Vec<Arc<LocalKeySigner>> = secrets
            .iter()
            .map(|&last| {
                let mut secret = [0u8; 32];
                secret[31] = last;
                Arc::new(LocalKeySigner::from_bytes(&secret).unwrap())
            })
            .collect();
        let labels = signers
            .iter()
            .enumerate()
            .map(|(i, s)| (s.address(), format!("account-{i}.eth")))
            .collect();
        Self {
            kind,
            chain_id: 1,
            signers,
            provider: Arc::new(StaticProvider { labels }),
        }
    }

    fn address(&self, index: usize) -> String {
        self.signers[index].address()
    }
}

#[async_trait]
impl Connector for KeyWallet {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    async fn activate(&self, args: ActivationArgs) -> Result<Activation, ConnectorError> {
        let chain_id = match args {
            ActivationArgs::Chain { chain_id } => chain_id,
            _ => self.chain_id,
        };
        Ok(Activation {
            chain_id,
            accounts: self.signers.iter().map(|s| s.address()).collect(),
        })
    }

    fn provider(&self) -> Option<Arc<dyn ChainProvider>> {
        Some(self.provider.clone() as Arc<dyn ChainProvider>)
    }

    fn signer(&self, account: &str) -> Option<Arc<dyn Signer>> {
        self.signers
            .iter()
            .find(|s| s.address().eq_ignore_ascii_case(account))
            .map(|s| s.clone() as Arc<dyn Signer>)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ForwardCall {
    signer: String,
    body: String,
    path: Vec<String>,
    context: Option<String>,
}

#[derive(Default)]
struct FakeEngineFactory {
    calls: Arc<Mutex<Vec<ForwardCall>>>,
    gateways: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    failure: Option<String>,
}

struct FakeEngine {
    signer: String,
    calls: Arc<Mutex<Vec<ForwardCall>>>,
    gate: Option<Arc<Semaphore>>,
    failure: Option<String>,
}

#[async_trait]
impl EngineFactory for FakeEngineFactory {
    async fn create(
        &self,
        _organization_address: &str,
        signer: Arc<dyn Signer>,
        options: &EngineOptions,
    ) -> Result<Box<dyn ScriptEngine>, EngineError> {
        assert!(options.ipfs_gateway.starts_with("https://"));
        self.gateways
            .lock()
            .unwrap()
            .push(options.ipfs_gateway.clone());
        Ok(Box::new(FakeEngine {
            signer: signer.address(),
            calls: self.calls.clone(),
            gate: self.gate.clone(),
            failure: self.failure.clone(),
        }))
    }
}

#[async_trait]
impl ScriptEngine for FakeEngine {
    async fn forward(
        &self,
        script: &CompiledScript,
        path: &[String],
        context: Option<&str>,
    ) -> Result<(), EngineError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.calls.lock().unwrap().push(ForwardCall {
            signer: self.signer.clone(),
            body: script.0.clone(),
            path: path.to_vec(),
            context: context.map(String::from),
        });
        match &self.failure {
            Some(message) => Err(EngineError::Execution(message.clone())),
            None => Ok(()),
        }
    }

    async fn app(&self, _segment: &str) -> Result<String, EngineError> {
        Ok(APP.to_string())
    }
}

fn options() -> EngineOptions {
    EngineOptions {
        ipfs_gateway: "https://ipfs.example/ipfs/".to_string(),
    }
}

fn script(header: &str, body: &str) -> ScriptDocument {
    ScriptDocument::new(format!("{header}\n{body}"))
}

async fn next_views(
    rx: &mut tokio::sync::watch::Receiver<Option<Vec<AccountView>>>,
    first_address: &str,
) -> Vec<AccountView> {
    timeout(
        WAIT,
        rx.wait_for(|views| {
            views
                .as_ref()
                .and_then(|v| v.first())
                .is_some_and(|view| view.address == first_address)
        }),
    )
    .await
    .expect("views not published in time")
    .expect("resolver dropped")
    .clone()
    .unwrap_or_default()
}

#[tokio::test]
async fn activated_session_forwards_and_redirects_to_dashboard() {
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::Injected, &[1]));
    let signer_address = wallet.address(0);
    let registry = SessionRegistry::from_connectors([wallet as Arc<dyn Connector>]);
    let session = registry.get(ConnectorKind::Injected).unwrap();

    assert_eq!(session.activate(ActivationArgs::None).await, ActivationState::Active);
    assert_eq!(registry.active().len(), 1);

    let factory = Arc::new(FakeEngineFactory::default());
    let pipeline = ForwardPipeline::new(factory.clone(), options());
    let document = script(
        &format!("connect {DAO} token-manager voting @context:https://forum.example/t/1"),
        "install agent\ngrant voting agent TRANSFER_ROLE voting",
    );

    let outcome = pipeline
        .execute_for_session(&session, &document)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ExecutionOutcome::Success {
            redirect_url: Some(format!("https://client.aragon.org/#/{DAO}/{APP}")),
        }
    );
    assert_eq!(
        factory.calls.lock().unwrap().clone(),
        vec![ForwardCall {
            signer: signer_address,
            body: "install agent\ngrant voting agent TRANSFER_ROLE voting".to_string(),
            path: vec!["token-manager".to_string(), "voting".to_string()],
            context: Some("https://forum.example/t/1".to_string()),
        }]
    );
    assert!(!session.is_forwarding());
}

#[tokio::test]
async fn forward_requires_an_active_session() {
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::WalletConnect, &[2]));
    let registry = SessionRegistry::from_connectors([wallet as Arc<dyn Connector>]);
    let session = registry.get(ConnectorKind::WalletConnect).unwrap();
    let pipeline = ForwardPipeline::new(Arc::new(FakeEngineFactory::default()), options());

    let result = pipeline
        .execute_for_session(&session, &script(&format!("connect {DAO} voting"), ""))
        .await;
    assert_eq!(result, Err(ForwardUnavailable::SessionInactive));
    assert!(!session.is_forwarding());
}

#[tokio::test]
async fn second_forward_from_same_session_is_refused_while_in_flight() {
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::Injected, &[3]));
    let other_wallet = Arc::new(KeyWallet::new(ConnectorKind::CoinbaseWallet, &[4]));
    let registry = SessionRegistry::from_connectors([
        wallet as Arc<dyn Connector>,
        other_wallet as Arc<dyn Connector>,
    ]);
    let session = registry.get(ConnectorKind::Injected).unwrap();
    let other = registry.get(ConnectorKind::CoinbaseWallet).unwrap();
    session.activate(ActivationArgs::None).await;
    other.activate(ActivationArgs::None).await;

    let gate = Arc::new(Semaphore::new(0));
    let factory = Arc::new(FakeEngineFactory {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let pipeline = Arc::new(ForwardPipeline::new(factory.clone(), options()));
    let document = script(&format!("connect {DAO} voting"), "exec voting vote 1");

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        let session = session.clone();
        let document = document.clone();
        async move { pipeline.execute_for_session(&session, &document).await }
    });
    timeout(WAIT, async {
        while !session.is_forwarding() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("first forward never started");

    assert_eq!(
        pipeline.execute_for_session(&session, &document).await,
        Err(ForwardUnavailable::InFlight)
    );

    // A different session is not blocked by the first one.
    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        let other = other.clone();
        let document = document.clone();
        async move { pipeline.execute_for_session(&other, &document).await }
    });

    gate.add_permits(2);
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(factory.calls.lock().unwrap().len(), 2);
    assert!(!session.is_forwarding());
    assert!(!other.is_forwarding());
}

#[tokio::test]
async fn engine_transaction_failure_surfaces_the_hash() {
    let hash = format!("0x{}", "ab".repeat(32));
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::Injected, &[5]));
    let session = SessionRegistry::from_connectors([wallet as Arc<dyn Connector>])
        .get(ConnectorKind::Injected)
        .unwrap();
    session.activate(ActivationArgs::None).await;

    let factory = Arc::new(FakeEngineFactory {
        failure: Some(format!("Transaction failed \"{hash}\" reverted")),
        ..Default::default()
    });
    let pipeline = ForwardPipeline::new(factory, options());

    let outcome = pipeline
        .execute_for_session(&session, &script(&format!("connect {DAO} voting"), "act agent"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ExecutionOutcome::Failure {
            classification: FailureClass::TransactionFailure,
            message: format!("Transaction failed, watch in block explorer `{hash}`"),
            transaction_hash: Some(hash),
        }
    );
    assert!(!session.is_forwarding());
}

#[tokio::test]
async fn header_errors_never_reach_the_engine() {
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::Injected, &[6]));
    let session = SessionRegistry::from_connectors([wallet as Arc<dyn Connector>])
        .get(ConnectorKind::Injected)
        .unwrap();
    session.activate(ActivationArgs::None).await;

    let factory = Arc::new(FakeEngineFactory::default());
    let pipeline = ForwardPipeline::new(factory.clone(), options());

    let ens = pipeline
        .execute_for_session(&session, &script("connect mydao.aragonid.eth voting", ""))
        .await
        .unwrap();
    assert_eq!(ens.classification(), Some(FailureClass::UnsupportedAddressForm));

    let malformed = pipeline
        .execute_for_session(&session, &script("install agent", ""))
        .await
        .unwrap();
    assert_eq!(malformed.classification(), Some(FailureClass::Validation));

    assert!(factory.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn resolver_follows_session_accounts_and_clears_on_disconnect() {
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::WalletConnect, &[7, 8]));
    let first = wallet.address(0);
    let second = wallet.address(1);
    let registry = SessionRegistry::from_connectors([wallet as Arc<dyn Connector>]);
    let session = registry.get(ConnectorKind::WalletConnect).unwrap();

    let resolver = Arc::new(AccountResolver::new());
    let mut rx = resolver.subscribe();
    let task = resolver.clone().follow(session.clone());

    session.activate(ActivationArgs::None).await;
    let views = next_views(&mut rx, &first).await;
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].label.as_deref(), Some("account-0.eth"));
    assert_eq!(views[1].label.as_deref(), Some("account-1.eth"));
    assert_eq!(views[0].balance, Some(BigUint::from(10u64).pow(18)));

    session.handle_event(ConnectorEvent::AccountsChanged(vec![second.clone()]));
    let views = next_views(&mut rx, &second).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].label.as_deref(), Some("account-1.eth"));

    session.handle_event(ConnectorEvent::Disconnected);
    timeout(WAIT, rx.wait_for(Option::is_none))
        .await
        .expect("views not cleared in time")
        .expect("resolver dropped");
    assert_eq!(resolver.views(), None);

    drop(registry);
    drop(session);
    timeout(WAIT, task)
        .await
        .expect("follow task did not stop")
        .unwrap();
}

#[tokio::test]
async fn network_switch_is_limited_to_capable_connectors() {
    let safe = Arc::new(KeyWallet::new(ConnectorKind::SafeApp, &[9]));
    let coinbase = Arc::new(KeyWallet::new(ConnectorKind::CoinbaseWallet, &[10]));
    let registry = SessionRegistry::from_connectors([
        safe as Arc<dyn Connector>,
        coinbase as Arc<dyn Connector>,
    ]);
    let safe = registry.get(ConnectorKind::SafeApp).unwrap();
    let coinbase = registry.get(ConnectorKind::CoinbaseWallet).unwrap();
    safe.activate(ActivationArgs::None).await;
    coinbase.activate(ActivationArgs::None).await;

    assert_eq!(safe.switch_network(100).await, None);
    assert_eq!(safe.chain_id(), Some(1));

    assert_eq!(coinbase.switch_network(100).await, Some(ActivationState::Active));
    assert_eq!(coinbase.chain_id(), Some(100));

    let pipeline = ForwardPipeline::new(Arc::new(FakeEngineFactory::default()), options());
    let outcome = pipeline
        .execute_for_session(&coinbase, &script(&format!("connect {DAO} voting"), ""))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ExecutionOutcome::Success {
            redirect_url: Some(format!("https://aragon.1hive.org/#/{DAO}/{APP}")),
        }
    );
}

#[tokio::test]
async fn pipeline_built_from_config_uses_the_configured_gateway() {
    let wallet = Arc::new(KeyWallet::new(ConnectorKind::Injected, &[11]));
    let session = SessionRegistry::from_connectors([wallet as Arc<dyn Connector>])
        .get(ConnectorKind::Injected)
        .unwrap();
    session.activate(ActivationArgs::None).await;

    let mut settings = Settings::default();
    settings.engine.ipfs_gateway = "https://gateway.example/ipfs/".to_string();
    let config = Config::resolve(&settings).unwrap();

    let factory = Arc::new(FakeEngineFactory::default());
    let pipeline = ForwardPipeline::from_config(factory.clone(), &config.engine);
    assert_eq!(pipeline.options().ipfs_gateway, "https://gateway.example/ipfs/");

    let outcome = pipeline
        .execute_for_session(&session, &script(&format!("connect {DAO} voting"), ""))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        factory.gateways.lock().unwrap().clone(),
        vec!["https://gateway.example/ipfs/".to_string()]
    );
}
