//! Field-scoped upserts into `tokens`.
//!
//! Each event kind owns a disjoint set of columns. An insert sets every
//! column the event cannot supply to NULL; a conflict updates only the
//! event's own columns, and only when one of them differs. Applying events
//! in any order therefore converges to the same row, and re-applying an
//! event changes nothing (not even `updated_at`).

use super::models::{
    AllowListStatus, AllowListUpdate, L1Registration, L2Registration, TokenRecord, TokenUpdate,
};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

pub struct TokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TokenRepository<'a> {
    const UPSERT_L1_REGISTRATION: &'static str = "INSERT INTO tokens (
            l1_address, symbol, name, decimals,
            l1_registration_block, l1_registration_tx, l1_message_l2_block,
            l2_address, l2_registration_block, l2_registration_tx_index, l2_registration_log_index,
            allow_list_status, allow_list_proposal_tx, allow_list_resolution_tx,
            updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            NULL, NULL, NULL, NULL,
            NULL, NULL, NULL,
            CAST(strftime('%s', 'now') AS INTEGER)
        )
        ON CONFLICT(l1_address) DO UPDATE SET
            symbol = excluded.symbol,
            name = excluded.name,
            decimals = excluded.decimals,
            l1_registration_block = excluded.l1_registration_block,
            l1_registration_tx = excluded.l1_registration_tx,
            l1_message_l2_block = excluded.l1_message_l2_block,
            updated_at = excluded.updated_at
        WHERE tokens.symbol IS NOT excluded.symbol
            OR tokens.name IS NOT excluded.name
            OR tokens.decimals IS NOT excluded.decimals
            OR tokens.l1_registration_block IS NOT excluded.l1_registration_block
            OR tokens.l1_registration_tx IS NOT excluded.l1_registration_tx
            OR tokens.l1_message_l2_block IS NOT excluded.l1_message_l2_block";

    const UPSERT_L2_REGISTRATION: &'static str = "INSERT INTO tokens (
            l1_address, symbol, name, decimals,
            l1_registration_block, l1_registration_tx, l1_message_l2_block,
            l2_address, l2_registration_block, l2_registration_tx_index, l2_registration_log_index,
            allow_list_status, allow_list_proposal_tx, allow_list_resolution_tx,
            updated_at
        ) VALUES (
            ?1, NULL, NULL, NULL,
            NULL, NULL, NULL,
            ?2, ?3, ?4, ?5,
            NULL, NULL, NULL,
            CAST(strftime('%s', 'now') AS INTEGER)
        )
        ON CONFLICT(l1_address) DO UPDATE SET
            l2_address = excluded.l2_address,
            l2_registration_block = excluded.l2_registration_block,
            l2_registration_tx_index = excluded.l2_registration_tx_index,
            l2_registration_log_index = excluded.l2_registration_log_index,
            updated_at = excluded.updated_at
        WHERE tokens.l2_address IS NOT excluded.l2_address
            OR tokens.l2_registration_block IS NOT excluded.l2_registration_block
            OR tokens.l2_registration_tx_index IS NOT excluded.l2_registration_tx_index
            OR tokens.l2_registration_log_index IS NOT excluded.l2_registration_log_index";

    // A proposal carries no resolution tx and vice versa, so the tx column the
    // event does not supply keeps its stored value.
    const UPSERT_ALLOW_LIST: &'static str = "INSERT INTO tokens (
            l1_address, symbol, name, decimals,
            l1_registration_block, l1_registration_tx, l1_message_l2_block,
            l2_address, l2_registration_block, l2_registration_tx_index, l2_registration_log_index,
            allow_list_status, allow_list_proposal_tx, allow_list_resolution_tx,
            updated_at
        ) VALUES (
            ?1, NULL, NULL, NULL,
            NULL, NULL, NULL,
            NULL, NULL, NULL, NULL,
            ?2, ?3, ?4,
            CAST(strftime('%s', 'now') AS INTEGER)
        )
        ON CONFLICT(l1_address) DO UPDATE SET
            allow_list_status = excluded.allow_list_status,
            allow_list_proposal_tx = COALESCE(excluded.allow_list_proposal_tx, tokens.allow_list_proposal_tx),
            allow_list_resolution_tx = COALESCE(excluded.allow_list_resolution_tx, tokens.allow_list_resolution_tx),
            updated_at = excluded.updated_at
        WHERE tokens.allow_list_status IS NOT excluded.allow_list_status
            OR (excluded.allow_list_proposal_tx IS NOT NULL
                AND tokens.allow_list_proposal_tx IS NOT excluded.allow_list_proposal_tx)
            OR (excluded.allow_list_resolution_tx IS NOT NULL
                AND tokens.allow_list_resolution_tx IS NOT excluded.allow_list_resolution_tx)";

    const SELECT_TOKEN: &'static str = "SELECT
            l1_address, symbol, name, decimals,
            l1_registration_block, l1_registration_tx, l1_message_l2_block,
            l2_address, l2_registration_block, l2_registration_tx_index, l2_registration_log_index,
            allow_list_status, allow_list_proposal_tx, allow_list_resolution_tx,
            updated_at
        FROM tokens";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns whether the row changed.
    pub fn apply_l1_registration(&self, registration: &L1Registration) -> Result<bool> {
        let changed = self.conn.execute(
            Self::UPSERT_L1_REGISTRATION,
            params![
                registration.l1_address,
                registration.symbol,
                registration.name,
                registration.decimals,
                registration.block_number,
                registration.transaction_hash,
                registration.l2_block_number,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn apply_l2_registration(&self, registration: &L2Registration) -> Result<bool> {
        let changed = self.conn.execute(
            Self::UPSERT_L2_REGISTRATION,
            params![
                registration.l1_address,
                registration.l2_address,
                registration.block_number,
                registration.tx_index,
                registration.log_index,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn apply_allow_list(&self, update: &AllowListUpdate) -> Result<bool> {
        let changed = self.conn.execute(
            Self::UPSERT_ALLOW_LIST,
            params![
                update.l1_address,
                update.status.as_str(),
                update.proposal_tx(),
                update.resolution_tx(),
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn apply(&self, update: &TokenUpdate) -> Result<bool> {
        match update {
            TokenUpdate::L1Registration(r) => self.apply_l1_registration(r),
            TokenUpdate::L2Registration(r) => self.apply_l2_registration(r),
            TokenUpdate::AllowList(u) => self.apply_allow_list(u),
        }
    }

    /// Applies updates in order on the current connection or transaction;
    /// returns the number of rows changed.
    pub fn apply_all(&self, updates: &[TokenUpdate]) -> Result<usize> {
        let mut changed = 0;
        for update in updates {
            if self.apply(update)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub fn get(&self, l1_address: &str) -> Result<Option<TokenRecord>> {
        let query = format!("{} WHERE l1_address = ?1", Self::SELECT_TOKEN);
        let record = self
            .conn
            .query_row(&query, params![l1_address], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    pub fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<TokenRecord> {
        let allow_list_status = row
            .get::<_, Option<String>>(11)?
            .map(|s| {
                s.parse::<AllowListStatus>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        11,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })
            })
            .transpose()?;

        Ok(TokenRecord {
            l1_address: row.get(0)?,
            symbol: row.get(1)?,
            name: row.get(2)?,
            decimals: row.get(3)?,
            l1_registration_block: row.get(4)?,
            l1_registration_tx: row.get(5)?,
            l1_message_l2_block: row.get(6)?,
            l2_address: row.get(7)?,
            l2_registration_block: row.get(8)?,
            l2_registration_tx_index: row.get(9)?,
            l2_registration_log_index: row.get(10)?,
            allow_list_status,
            allow_list_proposal_tx: row.get(12)?,
            allow_list_resolution_tx: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    fn l1_registration(address: &str) -> L1Registration {
        L1Registration {
            l1_address: address.into(),
            symbol: "TEST".into(),
            name: "Test Token".into(),
            decimals: 18,
            block_number: 100,
            transaction_hash: "0xabc".into(),
            l2_block_number: 7,
        }
    }

    fn l2_registration(address: &str) -> L2Registration {
        L2Registration {
            l1_address: address.into(),
            l2_address: format!("0x{}", "11".repeat(32)),
            block_number: 9,
            tx_index: 2,
            log_index: 1,
        }
    }

    fn allow_list(address: &str, status: AllowListStatus, tx: &str) -> AllowListUpdate {
        AllowListUpdate {
            l1_address: address.into(),
            status,
            block_number: 120,
            transaction_hash: tx.into(),
        }
    }

    #[test]
    fn registration_then_allow_list_keeps_both() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        repo.apply_l1_registration(&l1_registration("0x1")).unwrap();
        repo.apply_allow_list(&allow_list("0x1", AllowListStatus::Accepted, "0xacc"))
            .unwrap();

        let record = repo.get("0x1").unwrap().unwrap();
        assert_eq!(record.symbol.as_deref(), Some("TEST"));
        assert_eq!(record.decimals, Some(18));
        assert_eq!(record.allow_list_status, Some(AllowListStatus::Accepted));
        assert_eq!(record.allow_list_resolution_tx.as_deref(), Some("0xacc"));
    }

    #[test]
    fn rollup_registration_first_leaves_l1_fields_unknown() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        repo.apply_l2_registration(&l2_registration("0x1")).unwrap();
        let record = repo.get("0x1").unwrap().unwrap();
        assert_eq!(record.symbol, None);
        assert_eq!(record.l1_registration_block, None);
        assert_eq!(record.l2_registration_block, Some(9));

        repo.apply_l1_registration(&l1_registration("0x1")).unwrap();
        let record = repo.get("0x1").unwrap().unwrap();
        assert_eq!(record.symbol.as_deref(), Some("TEST"));
        assert_eq!(record.l2_registration_tx_index, Some(2));
        assert_eq!(record.l2_registration_log_index, Some(1));
    }

    #[test]
    fn merge_is_order_independent() {
        let updates = vec![
            TokenUpdate::L1Registration(l1_registration("0x1")),
            TokenUpdate::L2Registration(l2_registration("0x1")),
            TokenUpdate::AllowList(allow_list("0x1", AllowListStatus::Proposed, "0xp")),
        ];

        let forward = Database::in_memory().unwrap();
        TokenRepository::new(&forward.conn)
            .apply_all(&updates)
            .unwrap();

        let reversed: Vec<_> = updates.iter().rev().cloned().collect();
        let backward = Database::in_memory().unwrap();
        TokenRepository::new(&backward.conn)
            .apply_all(&reversed)
            .unwrap();

        let mut a = TokenRepository::new(&forward.conn).get("0x1").unwrap().unwrap();
        let mut b = TokenRepository::new(&backward.conn).get("0x1").unwrap().unwrap();
        a.updated_at = 0;
        b.updated_at = 0;
        assert_eq!(a, b);
    }

    #[test]
    fn reapplying_an_event_changes_nothing() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        let registration = l1_registration("0x1");

        assert!(repo.apply_l1_registration(&registration).unwrap());
        assert!(!repo.apply_l1_registration(&registration).unwrap());
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn rejection_keeps_prior_proposal_tx() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        repo.apply_allow_list(&allow_list("0x2", AllowListStatus::Proposed, "0xprop"))
            .unwrap();
        repo.apply_allow_list(&allow_list("0x2", AllowListStatus::Rejected, "0xdef"))
            .unwrap();

        let record = repo.get("0x2").unwrap().unwrap();
        assert_eq!(record.allow_list_status, Some(AllowListStatus::Rejected));
        assert_eq!(record.allow_list_resolution_tx.as_deref(), Some("0xdef"));
        assert_eq!(record.allow_list_proposal_tx.as_deref(), Some("0xprop"));
    }

    #[test]
    fn rejection_of_unknown_token_leaves_proposal_unknown() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);

        repo.apply_allow_list(&allow_list("0x2", AllowListStatus::Rejected, "0xdef"))
            .unwrap();

        let record = repo.get("0x2").unwrap().unwrap();
        assert_eq!(record.allow_list_status, Some(AllowListStatus::Rejected));
        assert_eq!(record.allow_list_resolution_tx.as_deref(), Some("0xdef"));
        assert_eq!(record.allow_list_proposal_tx, None);
        assert_eq!(record.symbol, None);
    }

    #[test]
    fn missing_token_reads_as_none() {
        let db = Database::in_memory().unwrap();
        let repo = TokenRepository::new(&db.conn);
        assert!(repo.get("0xdead").unwrap().is_none());
    }
}
