use alloy_primitives::B256;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::ChainScanner;
use crate::address::{L2Address, l1_address_from_field, l1_key};
use crate::events::l2_registered_tag;
use crate::repository::{Chain, L2Registration, TokenUpdate};
use crate::rollup::RollupClient;

/// Scans the rollup portal for token registrations.
///
/// The portal emits other public logs too. A registration log carries the
/// registration tag, then the settlement-chain token (left-padded to 32
/// bytes), then the rollup token address.
pub struct L2Scanner<R> {
    client: R,
    portal: L2Address,
    registered_tag: B256,
}

impl<R: RollupClient> L2Scanner<R> {
    pub fn new(client: R, portal: L2Address) -> Self {
        Self {
            client,
            portal,
            registered_tag: l2_registered_tag(),
        }
    }

    fn is_registration(&self, tag: &str) -> bool {
        B256::from_str(tag.trim()).is_ok_and(|tag| tag == self.registered_tag)
    }

    pub async fn scan_registrations(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<L2Registration>> {
        let mut logs = self
            .client
            .public_logs(&self.portal, from_block, to_block)
            .await?;
        logs.sort_by_key(|log| log.id);

        let mut registrations = Vec::new();
        for log in logs {
            let fields = log.log.fields.as_slice();
            if !fields.first().is_some_and(|tag| self.is_registration(tag)) {
                debug!("Skipping non-registration rollup log {:?}", log.id);
                continue;
            }

            let [_, l1_field, l2_field, ..] = fields else {
                warn!(
                    "Rollup registration {:?} has {} fields, expected 3, skipping",
                    log.id,
                    fields.len()
                );
                continue;
            };

            let l1_address = l1_address_from_field(l1_field)
                .with_context(|| format!("Malformed L1 address in rollup log {:?}", log.id))?;
            let l2_address: L2Address = l2_field
                .parse()
                .with_context(|| format!("Malformed L2 address in rollup log {:?}", log.id))?;

            registrations.push(L2Registration {
                l1_address: l1_key(&l1_address),
                l2_address: l2_address.to_string(),
                block_number: log.id.block_number,
                tx_index: log.id.tx_index,
                log_index: log.id.log_index,
            });
        }

        if !registrations.is_empty() {
            info!(
                "Found {} rollup registrations in blocks {}-{}",
                registrations.len(),
                from_block,
                to_block
            );
        }

        Ok(registrations)
    }
}

#[async_trait]
impl<R: RollupClient> ChainScanner for L2Scanner<R> {
    fn chain(&self) -> Chain {
        Chain::L2
    }

    async fn head(&self) -> Result<u64> {
        self.client.latest_block().await
    }

    async fn scan(&self, from_block: u64, to_block: u64) -> Result<Vec<TokenUpdate>> {
        Ok(self
            .scan_registrations(from_block, to_block)
            .await?
            .into_iter()
            .map(TokenUpdate::L2Registration)
            .collect())
    }
}
