#![allow(dead_code)]

use alloy_primitives::Address;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use token_resolver::chain::ChainId;
use token_resolver::naming::{NamingFanout, NamingProvider, ProviderId, StaticNamingProvider};
use token_resolver::orchestrator::{ImportSink, Resolver, ResolverContext};
use token_resolver::registry::{StaticTokens, TokenRegistry};
use token_resolver::repository::{Database, SqliteRegistryStore};
use token_resolver::token::TokenIdentity;
use token_resolver::verifier::{CallOutcome, ChainReader, FieldValue, TokenField, TokenVerifier};

pub const CAKE: &str = "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82";
pub const USDT: &str = "0x55d398326f99059fF775485246999027B3197955";
pub const WALLET: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

pub const DEBOUNCE: Duration = Duration::from_millis(500);
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

pub fn cake_token(chain_id: ChainId) -> TokenIdentity {
    TokenIdentity::new(chain_id, addr(CAKE), 18, "CAKE", "PancakeSwap Token")
}

pub fn usdt_token(chain_id: ChainId) -> TokenIdentity {
    TokenIdentity::new(chain_id, addr(USDT), 18, "USDT", "Tether USD")
}

pub fn metadata(token: &TokenIdentity) -> Vec<CallOutcome> {
    vec![
        CallOutcome::Success(Some(FieldValue::Decimals(token.decimals))),
        CallOutcome::Success(Some(FieldValue::Text(token.symbol.clone()))),
        CallOutcome::Success(Some(FieldValue::Text(token.name.clone()))),
    ]
}

/// Chain reader answering from a table; unknown addresses revert every call.
#[derive(Default)]
pub struct MockChainReader {
    outcomes: HashMap<Address, Vec<CallOutcome>>,
    latency: Option<Duration>,
    transport_error: Option<String>,
    pub calls: AtomicUsize,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &TokenIdentity) -> Self {
        self.outcomes.insert(token.address, metadata(token));
        self
    }

    pub fn with_outcomes(mut self, address: Address, outcomes: Vec<CallOutcome>) -> Self {
        self.outcomes.insert(address, outcomes);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every batch fails before reaching the node.
    pub fn with_transport_error(mut self, reason: &str) -> Self {
        self.transport_error = Some(reason.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn batch_read(
        &self,
        _chain_id: ChainId,
        address: Address,
        fields: &[TokenField],
    ) -> Result<Vec<CallOutcome>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(reason) = &self.transport_error {
            bail!("{}", reason);
        }
        Ok(self.outcomes.get(&address).cloned().unwrap_or_else(|| {
            fields
                .iter()
                .map(|_| CallOutcome::Failure("execution reverted".to_string()))
                .collect()
        }))
    }
}

pub type CallLog = Arc<Mutex<Vec<(ProviderId, Instant)>>>;

/// Records when each forward lookup started.
pub struct LoggedProvider {
    inner: StaticNamingProvider,
    log: CallLog,
}

impl LoggedProvider {
    pub fn new(inner: StaticNamingProvider, log: &CallLog) -> Arc<dyn NamingProvider> {
        Arc::new(Self {
            inner,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl NamingProvider for LoggedProvider {
    fn id(&self) -> ProviderId {
        self.inner.id()
    }

    async fn resolve_name(&self, name: &str, scope: ChainId) -> Result<Option<Address>> {
        self.log.lock().unwrap().push((self.id(), Instant::now()));
        self.inner.resolve_name(name, scope).await
    }

    async fn lookup_address(&self, address: Address, scope: ChainId) -> Result<Option<String>> {
        self.inner.lookup_address(address, scope).await
    }
}

pub fn calls(log: &CallLog) -> Vec<ProviderId> {
    log.lock().unwrap().iter().map(|(id, _)| *id).collect()
}

pub fn started_at(log: &CallLog, id: ProviderId) -> Option<Instant> {
    log.lock()
        .unwrap()
        .iter()
        .find(|(logged, _)| *logged == id)
        .map(|(_, at)| *at)
}

#[derive(Default)]
pub struct RecordingSink {
    offered: Mutex<Vec<TokenIdentity>>,
}

impl RecordingSink {
    pub fn offered(&self) -> Vec<TokenIdentity> {
        self.offered.lock().unwrap().clone()
    }
}

impl ImportSink for RecordingSink {
    fn offer(&self, token: &TokenIdentity) {
        self.offered.lock().unwrap().push(token.clone());
    }
}

pub struct Harness {
    pub resolver: Resolver,
    pub registry: Arc<TokenRegistry>,
    pub reader: Arc<MockChainReader>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(
        chain_id: ChainId,
        providers: Vec<Arc<dyn NamingProvider>>,
        reader: MockChainReader,
    ) -> Self {
        Self::with_registry(chain_id, providers, reader, StaticTokens::default())
    }

    pub fn with_registry(
        chain_id: ChainId,
        providers: Vec<Arc<dyn NamingProvider>>,
        reader: MockChainReader,
        static_tokens: StaticTokens,
    ) -> Self {
        let store = Arc::new(SqliteRegistryStore::new(Database::in_memory().unwrap()));
        let registry = Arc::new(TokenRegistry::new(store, static_tokens));
        let reader = Arc::new(reader);
        let sink = Arc::new(RecordingSink::default());

        let resolver = Resolver::spawn(ResolverContext {
            chain_id,
            debounce: DEBOUNCE,
            naming: Arc::new(NamingFanout::new(providers, PROVIDER_TIMEOUT)),
            registry: registry.clone(),
            verifier: Arc::new(TokenVerifier::new(reader.clone())),
            import: Some(sink.clone() as Arc<dyn ImportSink>),
        });

        Self {
            resolver,
            registry,
            reader,
            sink,
        }
    }
}
