use super::models::Chain;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, warn};

/// Last fully scanned block per chain.
///
/// `set` never moves a cursor backwards; a regressive write is ignored and
/// reported as `false`. Only `reset` may rewind.
pub struct ProgressRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> ProgressRepository<'a> {
    const GET_PROGRESS: &'static str =
        "SELECT last_scanned_block FROM block_progress WHERE chain = ?1";

    const ADVANCE_PROGRESS: &'static str =
        "INSERT INTO block_progress (chain, last_scanned_block, updated_at)
         VALUES (?1, ?2, CAST(strftime('%s', 'now') AS INTEGER))
         ON CONFLICT(chain) DO UPDATE SET
            last_scanned_block = excluded.last_scanned_block,
            updated_at = excluded.updated_at
         WHERE excluded.last_scanned_block > block_progress.last_scanned_block";

    const RESET_PROGRESS: &'static str =
        "INSERT INTO block_progress (chain, last_scanned_block, updated_at)
         VALUES (?1, ?2, CAST(strftime('%s', 'now') AS INTEGER))
         ON CONFLICT(chain) DO UPDATE SET
            last_scanned_block = excluded.last_scanned_block,
            updated_at = excluded.updated_at";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns 0 when the chain has never been scanned.
    pub fn get(&self, chain: Chain) -> Result<u64> {
        let block: Option<u64> = self
            .conn
            .query_row(Self::GET_PROGRESS, params![chain.label()], |row| row.get(0))
            .optional()?;
        Ok(block.unwrap_or(0))
    }

    /// Advances the cursor; returns whether the stored value changed.
    pub fn set(&self, chain: Chain, block_number: u64) -> Result<bool> {
        let changed = self
            .conn
            .execute(Self::ADVANCE_PROGRESS, params![chain.label(), block_number])?;

        if changed == 0 {
            debug!(
                "Ignoring non-advancing {} cursor write to block {}",
                chain, block_number
            );
        } else {
            debug!("{} cursor advanced to {}", chain, block_number);
        }
        Ok(changed > 0)
    }

    /// Explicit override: sets the cursor even if it moves backwards.
    pub fn reset(&self, chain: Chain, block_number: u64) -> Result<()> {
        self.conn
            .execute(Self::RESET_PROGRESS, params![chain.label(), block_number])?;
        warn!("{} cursor reset to {}", chain, block_number);
        Ok(())
    }
}
