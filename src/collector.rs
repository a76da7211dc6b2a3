//! Poll-cycle orchestration for both chains.
//!
//! One `poll()` computes a bounded window per chain, scans and persists each
//! chain that is behind its head (L1 fully before L2), and reports whether
//! both chains are caught up. Records and the cursor advance of a chunk are
//! committed in one transaction, so a failed chunk is re-scanned from the
//! same window on the next poll.

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ChainSettings, Config};
use crate::repository::{Chain, Database, ProgressRepository, TokenRepository, TokenUpdate};
use crate::scanner::ChainScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// At least one chain has unscanned blocks below its head.
    CatchingUp,
    /// Both chains scanned to their last observed head.
    Synced,
    /// The last poll failed; back to `CatchingUp` after the polling interval.
    Error,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub l1: ChainSettings,
    pub l2: ChainSettings,
    pub polling_interval: Duration,
    /// Stop once both chains are caught up instead of sleeping.
    pub exit_when_caught_up: bool,
}

impl CollectorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            l1: config.l1,
            l2: config.l2,
            polling_interval: config.polling_interval,
            exit_when_caught_up: config.is_backfill(),
        }
    }

    fn chain(&self, chain: Chain) -> &ChainSettings {
        match chain {
            Chain::L1 => &self.l1,
            Chain::L2 => &self.l2,
        }
    }
}

/// A bounded block range, computed against the head observed at poll start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub from_block: u64,
    pub to_block: u64,
    pub head: u64,
}

impl ScanWindow {
    pub fn new(from_block: u64, chunk_size: u64, head: u64) -> Self {
        let last_in_chunk = from_block.saturating_add(chunk_size.max(1) - 1);
        Self {
            from_block,
            to_block: last_in_chunk.min(head),
            head,
        }
    }

    /// Nothing left to scan below the head.
    pub fn is_caught_up(&self) -> bool {
        self.from_block > self.head
    }

    /// Whether scanning this window reaches the head.
    pub fn reaches_head(&self) -> bool {
        self.to_block >= self.head
    }
}

pub struct CollectorService<A, B> {
    db: Database,
    l1: A,
    l2: B,
    config: CollectorConfig,
    state: CollectorState,
    // In-memory cursors used instead of the stored ones while backfilling.
    l1_backfill_from: Option<u64>,
    l2_backfill_from: Option<u64>,
}

impl<A: ChainScanner, B: ChainScanner> CollectorService<A, B> {
    pub fn new(db: Database, l1: A, l2: B, config: CollectorConfig) -> Self {
        Self {
            l1_backfill_from: config.l1.override_start_block,
            l2_backfill_from: config.l2.override_start_block,
            db,
            l1,
            l2,
            config,
            state: CollectorState::CatchingUp,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn backfill_from(&mut self, chain: Chain) -> &mut Option<u64> {
        match chain {
            Chain::L1 => &mut self.l1_backfill_from,
            Chain::L2 => &mut self.l2_backfill_from,
        }
    }

    /// First block of the next window for `chain`.
    fn next_from_block(&mut self, chain: Chain) -> Result<u64> {
        if let Some(from_block) = *self.backfill_from(chain) {
            return Ok(from_block);
        }

        let cursor = ProgressRepository::new(&self.db.conn).get(chain)?;
        Ok(if cursor == 0 {
            self.config.chain(chain).start_block
        } else {
            cursor + 1
        })
    }

    /// Runs one poll cycle; returns `true` when both chains are caught up.
    pub async fn poll(&mut self) -> Result<bool> {
        let l1_from = self.next_from_block(Chain::L1)?;
        let l2_from = self.next_from_block(Chain::L2)?;

        let (l1_head, l2_head) = tokio::try_join!(self.l1.head(), self.l2.head())?;

        let l1_window = ScanWindow::new(l1_from, self.config.l1.chunk_size, l1_head);
        let l2_window = ScanWindow::new(l2_from, self.config.l2.chunk_size, l2_head);

        let mut l1_caught_up = l1_window.is_caught_up();
        let mut l2_caught_up = l2_window.is_caught_up();

        if l1_caught_up && l2_caught_up {
            debug!(
                "Both chains caught up (L1 head {}, L2 head {})",
                l1_head, l2_head
            );
            return Ok(true);
        }

        if !l1_caught_up {
            let updates = self
                .l1
                .scan(l1_window.from_block, l1_window.to_block)
                .await?;
            l1_caught_up = self.commit(self.l1.chain(), &l1_window, &updates)?;
        }

        if !l2_caught_up {
            let updates = self
                .l2
                .scan(l2_window.from_block, l2_window.to_block)
                .await?;
            l2_caught_up = self.commit(self.l2.chain(), &l2_window, &updates)?;
        }

        Ok(l1_caught_up && l2_caught_up)
    }

    /// Persists a scanned chunk and advances the chain's cursor atomically.
    fn commit(&mut self, chain: Chain, window: &ScanWindow, updates: &[TokenUpdate]) -> Result<bool> {
        let tx = self.db.conn.unchecked_transaction()?;
        let changed = TokenRepository::new(&tx).apply_all(updates)?;
        let advanced = ProgressRepository::new(&tx).set(chain, window.to_block)?;
        tx.commit()?;

        if let Some(from_block) = self.backfill_from(chain).as_mut() {
            *from_block = window.to_block + 1;
        }

        info!(
            "{} blocks {}-{} (head {}): {} records, {} rows changed, cursor {}",
            chain,
            window.from_block,
            window.to_block,
            window.head,
            updates.len(),
            changed,
            if advanced { "advanced" } else { "unchanged" }
        );

        Ok(window.reaches_head())
    }

    fn transition(&mut self, next: CollectorState) {
        if self.state != next {
            info!("Collector state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Polls until `shutdown` fires, or until caught up in backfill mode.
    ///
    /// Caught up or failed polls wait `polling_interval` before the next one;
    /// a poll that is still catching up is followed immediately.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Collector started (polling every {:?}, backfill: {})",
            self.config.polling_interval, self.config.exit_when_caught_up
        );

        while !shutdown.is_cancelled() {
            let wait = match self.poll().await {
                Ok(true) => {
                    self.transition(CollectorState::Synced);
                    if self.config.exit_when_caught_up {
                        info!("Backfill finished, both chains caught up");
                        return Ok(());
                    }
                    true
                }
                Ok(false) => {
                    self.transition(CollectorState::CatchingUp);
                    false
                }
                Err(e) => {
                    error!(
                        "Poll failed, retrying in {:?}: {:#}",
                        self.config.polling_interval, e
                    );
                    self.transition(CollectorState::Error);
                    true
                }
            };

            if wait {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(self.config.polling_interval) => {}
                }
                if self.state == CollectorState::Error {
                    self.transition(CollectorState::CatchingUp);
                }
            }
        }

        info!("Collector stopped");
        Ok(())
    }
}
