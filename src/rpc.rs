use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy_primitives::Address;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use crate::abi::{self, IMulticall3};
use crate::chain::ChainId;
use crate::verifier::{CallOutcome, ChainReader, TokenField};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<DynProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
    chain_id: ChainId,
    multicall_address: Address,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String], chain_id: ChainId, multicall_address: Address) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider = ProviderBuilder::new().connect_http(parsed_url).erased();
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries: 3,
            chain_id,
            multicall_address,
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn get_provider(&self) -> &DynProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) {
        let current_url = self.get_current_url();
        warn!(
            "RPC error on {}: {}, rotating provider",
            current_url, error_str
        );
        self.rotate_provider();
    }

    fn handle_timeout(&self) -> anyhow::Error {
        let current_url = self.get_current_url();
        warn!(
            "Request timeout after {} seconds on {}, rotating provider",
            REQUEST_TIMEOUT.as_secs(),
            current_url
        );
        self.rotate_provider();
        anyhow::anyhow!(
            "Request timeout after {} seconds",
            REQUEST_TIMEOUT.as_secs()
        )
    }

    pub async fn aggregate3(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Call3Result>> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            let calls = calls.clone();
            async move {
                let multicall =
                    IMulticall3::new(client.multicall_address, client.get_provider().clone());
                match timeout(REQUEST_TIMEOUT, multicall.aggregate3(calls).call()).await {
                    Ok(Ok(results)) => Ok(results),
                    Ok(Err(e)) => {
                        let error_str = e.to_string();
                        client.handle_error(&error_str);
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn batch_read(
        &self,
        chain_id: ChainId,
        address: Address,
        fields: &[TokenField],
    ) -> Result<Vec<CallOutcome>> {
        if chain_id != self.chain_id {
            bail!(
                "RPC client is connected to chain {}, cannot read chain {}",
                self.chain_id,
                chain_id
            );
        }

        let calls = fields
            .iter()
            .map(|field| IMulticall3::Call3 {
                target: address,
                allowFailure: true,
                callData: abi::encode_call(*field),
            })
            .collect();

        let results = self.aggregate3(calls).await?;
        if results.len() != fields.len() {
            bail!(
                "Multicall returned {} results for {} calls",
                results.len(),
                fields.len()
            );
        }

        Ok(fields
            .iter()
            .zip(results)
            .map(|(field, result)| {
                if result.success {
                    abi::decode_field(*field, &result.returnData)
                } else {
                    CallOutcome::Failure(format!("{field:?} call reverted"))
                }
            })
            .collect())
    }
}
