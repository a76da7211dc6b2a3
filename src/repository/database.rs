use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {db_path}"))?;

        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    /// Ephemeral database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                l1_address TEXT PRIMARY KEY,
                symbol TEXT,
                name TEXT,
                decimals INTEGER,
                l1_registration_block INTEGER,
                l1_registration_tx TEXT,
                l1_message_l2_block INTEGER,
                l2_address TEXT,
                l2_registration_block INTEGER,
                l2_registration_tx_index INTEGER,
                l2_registration_log_index INTEGER,
                allow_list_status TEXT,
                allow_list_proposal_tx TEXT,
                allow_list_resolution_tx TEXT,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS block_progress (
                chain TEXT PRIMARY KEY,
                last_scanned_block INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Lookups by rollup address and ordered listings by rollup registration
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_l2_address
             ON tokens(l2_address)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_l2_registration
             ON tokens(l2_registration_block, l2_registration_tx_index, l2_registration_log_index)",
            [],
        )?;

        debug!("Schema ready");
        Ok(())
    }
}
