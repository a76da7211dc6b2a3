use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log, TransactionInput, TransactionRequest};
use alloy::transports::TransportResult;
use alloy_primitives::{Address, B256, Bytes};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120); // 2 minutes timeout per request

/// Read-only view of the settlement chain used by the scanners.
#[async_trait]
pub trait EvmClient: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Logs emitted by `address` with `topic0` in `[from_block, to_block]`.
    async fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>>;

    /// `eth_call` against the latest state.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes>;
}

#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<RootProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String], max_retries: usize) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider = ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries,
        })
    }

    fn get_provider(&self) -> &RootProvider {
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
            .max_delay(Duration::from_secs(10))
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

    /// Sends one request through the current provider, retrying with backoff.
    ///
    /// Failures rotate to the next endpoint. A log query over the provider's
    /// result limit is not retried; it is returned at once so the caller can
    /// split the range.
    async fn request<T, F, Fut>(&self, method: &'static str, op: F) -> Result<T>
    where
        T: Send,
        F: Fn(RootProvider) -> Fut + Send + Sync,
        Fut: Future<Output = TransportResult<T>> + Send,
    {
        let op = &op;
        Retry::spawn(self.get_retry_strategy(), move || async move {
            match timeout(REQUEST_TIMEOUT, op(self.get_provider().clone())).await {
                Ok(Ok(value)) => Ok(Ok(value)),
                Ok(Err(e)) if is_max_results_error(&e.to_string()) => {
                    debug!("{} hit the provider result limit", method);
                    Ok(Err(anyhow::anyhow!("{}", e)))
                }
                Ok(Err(e)) => {
                    self.handle_error(&e.to_string());
                    Err(anyhow::anyhow!("{} failed: {}", method, e))
                }
                Err(_) => Err(self.handle_timeout()),
            }
        })
        .await
        .and_then(|r| r)
    }

    pub async fn get_latest_block(&self) -> Result<u64> {
        self.request("eth_blockNumber", |provider| async move {
            provider.get_block_number().await
        })
        .await
    }

    pub async fn call_raw(&self, to: Address, input: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(input));
        self.request("eth_call", move |provider| {
            let request = request.clone();
            async move { provider.call(request).await }
        })
        .await
    }

    async fn get_logs_internal(
        &self,
        from_block: u64,
        to_block: u64,
        contract_address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(contract_address)
            .event_signature(topic0)
            .from_block(from_block)
            .to_block(to_block);
        self.request("eth_getLogs", move |provider| {
            let filter = filter.clone();
            async move { provider.get_logs(&filter).await }
        })
        .await
    }

    fn parse_max_results_error(error_str: &str) -> Option<(u64, u64)> {
        let re = Regex::new(r"retry with the range (\d+)-(\d+)").ok()?;
        let captures = re.captures(error_str)?;

        let from = captures.get(1)?.as_str().parse().ok()?;
        let to = captures.get(2)?.as_str().parse().ok()?;

        Some((from, to))
    }

    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        contract_address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>> {
        let mut all_logs = Vec::new();
        let mut current_from = from_block;

        while current_from <= to_block {
            match self
                .get_logs_internal(current_from, to_block, contract_address, topic0)
                .await
            {
                Ok(logs) => {
                    all_logs.extend(logs);
                    break;
                }
                Err(e) => {
                    let error_str = e.to_string();

                    let suggested = is_max_results_error(&error_str)
                        .then(|| Self::parse_max_results_error(&error_str))
                        .flatten()
                        .filter(|(from, to)| *from == current_from && *to >= *from);

                    let Some((suggested_from, suggested_to)) = suggested else {
                        return Err(e);
                    };

                    info!(
                        "Hit max results limit for blocks {}-{}, splitting at block {}",
                        current_from, to_block, suggested_to
                    );

                    let logs = self
                        .get_logs_internal(suggested_from, suggested_to, contract_address, topic0)
                        .await?;

                    all_logs.extend(logs);
                    current_from = suggested_to + 1;
                }
            }
        }

        Ok(all_logs)
    }
}

fn is_max_results_error(error_str: &str) -> bool {
    error_str.contains("exceeds max results")
}

#[async_trait]
impl EvmClient for RpcClient {
    async fn latest_block(&self) -> Result<u64> {
        self.get_latest_block().await
    }

    async fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topic0: B256,
    ) -> Result<Vec<Log>> {
        self.get_logs(from_block, to_block, address, topic0).await
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes> {
        self.call_raw(to, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suggested_range_from_provider_error() {
        let err = "query exceeds max results 10000, retry with the range 100-250";
        assert_eq!(RpcClient::parse_max_results_error(err), Some((100, 250)));
    }

    #[test]
    fn ignores_unrelated_errors() {
        assert_eq!(RpcClient::parse_max_results_error("connection reset"), None);
    }

    #[test]
    fn requires_at_least_one_url() {
        assert!(RpcClient::new(&[], 3).is_err());
    }

    #[test]
    fn rotates_between_providers() {
        let urls = vec![
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:2".to_string(),
        ];
        let client = RpcClient::new(&urls, 1).unwrap();
        assert_eq!(client.get_current_url(), "http://127.0.0.1:1");
        client.rotate_provider();
        assert_eq!(client.get_current_url(), "http://127.0.0.1:2");
        client.rotate_provider();
        assert_eq!(client.get_current_url(), "http://127.0.0.1:1");
    }
}
