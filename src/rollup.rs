//! Rollup node JSON-RPC client.
//!
//! The rollup exposes public logs keyed by `(block, tx index, log index)`
//! rather than EVM logs, so this client talks to the node directly through
//! alloy's transport-level JSON-RPC client.

use alloy::rpc::client::{ClientBuilder, RpcClient as JsonRpcClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use crate::address::L2Address;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Position of a public log on the rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    pub block_number: u64,
    pub tx_index: u64,
    pub log_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLog {
    pub contract_address: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupLog {
    pub id: LogId,
    pub log: PublicLog,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicLogsResponse {
    logs: Vec<RollupLog>,
    #[serde(default)]
    max_logs_hit: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogFilter {
    from_block: u64,
    // exclusive on the node side
    to_block: u64,
    contract_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    after_log: Option<LogId>,
}

/// Read-only view of the rollup used by the L2 scanner.
#[async_trait]
pub trait RollupClient: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Public logs emitted by `contract` in `[from_block, to_block]`.
    async fn public_logs(
        &self,
        contract: &L2Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RollupLog>>;
}

#[derive(Clone)]
pub struct RollupNode {
    client: JsonRpcClient,
    url: String,
    max_retries: usize,
}

impl RollupNode {
    pub fn new(url: &str, max_retries: usize) -> Result<Self> {
        let parsed_url = url
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid rollup node URL: {}", url))?;
        let client = ClientBuilder::default().http(parsed_url);
        Ok(RollupNode {
            client,
            url: url.to_string(),
            max_retries,
        })
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R>
    where
        P: Serialize + Clone + Send + Sync + std::fmt::Debug + Unpin + 'static,
        R: serde::de::DeserializeOwned + Send + Sync + std::fmt::Debug + Unpin + 'static,
    {
        let client = self.client.clone();
        let url = self.url.clone();
        Retry::spawn(self.retry_strategy(), move || {
            let client = client.clone();
            let url = url.clone();
            let params = params.clone();
            async move {
                match timeout(REQUEST_TIMEOUT, client.request::<P, R>(method, params)).await {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => {
                        warn!("Rollup node error on {} calling {}: {}", url, method, e);
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => {
                        warn!(
                            "Rollup node request {} timed out after {} seconds",
                            method,
                            REQUEST_TIMEOUT.as_secs()
                        );
                        Err(anyhow::anyhow!(
                            "Request timeout after {} seconds",
                            REQUEST_TIMEOUT.as_secs()
                        ))
                    }
                }
            }
        })
        .await
        .with_context(|| format!("{method} failed"))
    }
}

#[async_trait]
impl RollupClient for RollupNode {
    async fn latest_block(&self) -> Result<u64> {
        self.request::<(), u64>("node_getBlockNumber", ()).await
    }

    async fn public_logs(
        &self,
        contract: &L2Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RollupLog>> {
        let mut all_logs = Vec::new();
        let mut after_log = None;

        loop {
            let filter = LogFilter {
                from_block,
                to_block: to_block + 1,
                contract_address: contract.to_string(),
                after_log,
            };
            let page: PublicLogsResponse = self
                .request::<(LogFilter,), PublicLogsResponse>("node_getPublicLogs", (filter,))
                .await?;

            let last = page.logs.last().map(|log| log.id);
            all_logs.extend(page.logs);

            match (page.max_logs_hit, last) {
                (true, Some(id)) => {
                    debug!("Rollup log page limit hit, continuing after {:?}", id);
                    after_log = Some(id);
                }
                _ => break,
            }
        }

        Ok(all_logs)
    }
}
