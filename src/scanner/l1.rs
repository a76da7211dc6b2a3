use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

use super::ChainScanner;
use crate::address::l1_key;
use crate::events::{MessageSent, Registered, StatusUpdated, decode_event};
use crate::metadata::fetch_token_metadata;
use crate::repository::{AllowListStatus, AllowListUpdate, Chain, L1Registration, TokenUpdate};
use crate::rpc::EvmClient;

#[derive(Debug, Clone, Copy)]
pub struct L1Contracts {
    pub portal: Address,
    pub inbox: Address,
    pub allow_list: Address,
}

/// Scans the settlement chain: portal registrations correlated with inbox
/// messages, plus allow-list status changes.
pub struct L1Scanner<C> {
    client: C,
    contracts: L1Contracts,
}

struct PortalRegistration {
    token: Address,
    block_number: u64,
    log_index: u64,
    transaction_hash: B256,
}

struct InboxMessage {
    l2_block_number: u64,
    log_index: u64,
}

/// Where a log sits on chain; `None` when the node omitted a field.
fn position(log: &Log) -> Option<(B256, u64, u64)> {
    Some((log.transaction_hash?, log.block_number?, log.log_index?))
}

impl<C: EvmClient> L1Scanner<C> {
    pub fn new(client: C, contracts: L1Contracts) -> Self {
        Self { client, contracts }
    }

    pub async fn scan_registrations(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<L1Registration>> {
        let (portal_logs, inbox_logs) = tokio::try_join!(
            self.client.logs(
                from_block,
                to_block,
                self.contracts.portal,
                Registered::SIGNATURE_HASH
            ),
            self.client.logs(
                from_block,
                to_block,
                self.contracts.inbox,
                MessageSent::SIGNATURE_HASH
            ),
        )?;

        debug!(
            "Blocks {}-{}: {} portal registrations, {} inbox messages",
            from_block,
            to_block,
            portal_logs.len(),
            inbox_logs.len()
        );

        let mut messages = index_inbox_messages(&inbox_logs);

        let mut correlated = Vec::new();
        for registration in portal_registrations(&portal_logs) {
            let message = messages
                .get_mut(&registration.transaction_hash)
                .and_then(VecDeque::pop_front);

            match message {
                Some(message) => correlated.push((registration, message)),
                None => warn!(
                    "No inbox message for registration in transaction {:?}, skipping",
                    registration.transaction_hash
                ),
            }
        }

        let metadata = try_join_all(
            correlated
                .iter()
                .map(|(registration, _)| fetch_token_metadata(&self.client, registration.token)),
        )
        .await?;

        let registrations: Vec<L1Registration> = correlated
            .into_iter()
            .zip(metadata)
            .map(|((registration, message), metadata)| L1Registration {
                l1_address: l1_key(&registration.token),
                symbol: metadata.symbol,
                name: metadata.name,
                decimals: metadata.decimals,
                block_number: registration.block_number,
                transaction_hash: format!("{:?}", registration.transaction_hash),
                l2_block_number: message.l2_block_number,
            })
            .collect();

        if !registrations.is_empty() {
            info!(
                "Found {} token registrations in blocks {}-{}",
                registrations.len(),
                from_block,
                to_block
            );
        }

        Ok(registrations)
    }

    pub async fn scan_allow_list(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<AllowListUpdate>> {
        let mut logs = self
            .client
            .logs(
                from_block,
                to_block,
                self.contracts.allow_list,
                StatusUpdated::SIGNATURE_HASH,
            )
            .await?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        let mut updates = Vec::new();
        for log in &logs {
            let Some((transaction_hash, block_number, _)) = position(log) else {
                warn!("Skipping StatusUpdated log without position: {:?}", log);
                continue;
            };

            let event = match decode_event::<StatusUpdated>(log) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "Skipping undecodable StatusUpdated in transaction {:?}: {}",
                        transaction_hash, e
                    );
                    continue;
                }
            };

            if event.token == Address::ZERO {
                warn!(
                    "StatusUpdated in transaction {:?} has no token address, skipping",
                    transaction_hash
                );
                continue;
            }

            let Some(status) = AllowListStatus::from_code(event.status) else {
                warn!(
                    "StatusUpdated in transaction {:?} has no usable status (code {}), skipping",
                    transaction_hash, event.status
                );
                continue;
            };

            updates.push(AllowListUpdate {
                l1_address: l1_key(&event.token),
                status,
                block_number,
                transaction_hash: format!("{transaction_hash:?}"),
            });
        }

        Ok(updates)
    }
}

/// Decodes portal logs in chain order, dropping ones that cannot be placed.
fn portal_registrations(logs: &[Log]) -> Vec<PortalRegistration> {
    let mut registrations: Vec<PortalRegistration> = logs
        .iter()
        .filter_map(|log| {
            let Some((transaction_hash, block_number, log_index)) = position(log) else {
                warn!("Skipping Registered log without position: {:?}", log);
                return None;
            };
            match decode_event::<Registered>(log) {
                Ok(event) => Some(PortalRegistration {
                    token: event.token,
                    block_number,
                    log_index,
                    transaction_hash,
                }),
                Err(e) => {
                    warn!(
                        "Skipping undecodable Registered in transaction {:?}: {}",
                        transaction_hash, e
                    );
                    None
                }
            }
        })
        .collect();
    registrations.sort_by_key(|r| (r.block_number, r.log_index));
    registrations
}

/// Inbox messages grouped by transaction, each group in log order.
///
/// A transaction may carry several messages; all are kept so that the n-th
/// registration of a transaction pairs with its n-th message.
fn index_inbox_messages(logs: &[Log]) -> HashMap<B256, VecDeque<InboxMessage>> {
    let mut decoded: Vec<(B256, InboxMessage)> = Vec::new();

    for log in logs {
        let Some((transaction_hash, _, log_index)) = position(log) else {
            warn!("Skipping MessageSent log without position: {:?}", log);
            continue;
        };
        let event = match decode_event::<MessageSent>(log) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Skipping undecodable MessageSent in transaction {:?}: {}",
                    transaction_hash, e
                );
                continue;
            }
        };
        let Ok(l2_block_number) = u64::try_from(event.l2BlockNumber) else {
            warn!(
                "MessageSent in transaction {:?} carries out-of-range rollup block {}, skipping",
                transaction_hash, event.l2BlockNumber
            );
            continue;
        };
        decoded.push((
            transaction_hash,
            InboxMessage {
                l2_block_number,
                log_index,
            },
        ));
    }

    decoded.sort_by_key(|(_, message)| message.log_index);

    let mut by_tx: HashMap<B256, VecDeque<InboxMessage>> = HashMap::new();
    for (transaction_hash, message) in decoded {
        by_tx.entry(transaction_hash).or_default().push_back(message);
    }
    by_tx
}

#[async_trait]
impl<C: EvmClient> ChainScanner for L1Scanner<C> {
    fn chain(&self) -> Chain {
        Chain::L1
    }

    async fn head(&self) -> Result<u64> {
        self.client.latest_block().await
    }

    async fn scan(&self, from_block: u64, to_block: u64) -> Result<Vec<TokenUpdate>> {
        let (registrations, allow_list) = tokio::try_join!(
            self.scan_registrations(from_block, to_block),
            self.scan_allow_list(from_block, to_block),
        )?;

        Ok(registrations
            .into_iter()
            .map(TokenUpdate::L1Registration)
            .chain(allow_list.into_iter().map(TokenUpdate::AllowList))
            .collect())
    }
}
