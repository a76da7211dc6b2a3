use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::address::L2Address;

const DEFAULT_CHUNK_SIZE: u64 = 1000; // Most public RPCs allow up to 1k blocks per log query
const DEFAULT_POLLING_INTERVAL_MS: u64 = 12_000;
const DEFAULT_RPC_MAX_RETRIES: usize = 5;

/// Scan window settings for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    /// Used in place of an unset (zero) cursor.
    pub start_block: u64,
    pub chunk_size: u64,
    /// Backfill: scan from here regardless of the stored cursor.
    pub override_start_block: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub network: String,
    pub l1_rpc_urls: Vec<String>,
    pub l1_portal_address: Address,
    pub l1_inbox_address: Address,
    pub l1_allow_list_address: Address,
    pub l2_node_url: String,
    pub l2_portal_address: L2Address,
    pub l1: ChainSettings,
    pub l2: ChainSettings,
    pub polling_interval: Duration,
    pub database_url: String,
    pub rpc_max_retries: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set in .env"))
        };

        let optional_u64 = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .with_context(|| format!("Invalid {key}: {v}"))
                })
                .transpose()
        };

        let l1_address = |key: &str| -> Result<Address> {
            let value = required(key)?;
            Address::from_str(value.trim()).with_context(|| format!("Invalid {key} format"))
        };

        let chain_settings = |prefix: &str| -> Result<ChainSettings> {
            let chunk_size =
                optional_u64(&format!("{prefix}_CHUNK_SIZE"))?.unwrap_or(DEFAULT_CHUNK_SIZE);
            if chunk_size == 0 {
                anyhow::bail!("{prefix}_CHUNK_SIZE must be greater than zero");
            }
            Ok(ChainSettings {
                start_block: optional_u64(&format!("{prefix}_START_BLOCK"))?.unwrap_or(0),
                chunk_size,
                override_start_block: optional_u64(&format!("{prefix}_OVERRIDE_START_BLOCK"))?,
            })
        };

        let l1_rpc_urls: Vec<String> = required("L1_RPC_URLS")?
            .split(',')
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        let l2_portal_address = required("L2_PORTAL_ADDRESS")?
            .parse::<L2Address>()
            .context("Invalid L2_PORTAL_ADDRESS format")?;

        let rpc_max_retries = optional_u64("RPC_MAX_RETRIES")?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_RPC_MAX_RETRIES);

        Ok(Config {
            network: required("NETWORK")?,
            l1_rpc_urls,
            l1_portal_address: l1_address("L1_PORTAL_ADDRESS")?,
            l1_inbox_address: l1_address("L1_INBOX_ADDRESS")?,
            l1_allow_list_address: l1_address("L1_ALLOW_LIST_ADDRESS")?,
            l2_node_url: required("L2_NODE_URL")?,
            l2_portal_address,
            l1: chain_settings("L1")?,
            l2: chain_settings("L2")?,
            polling_interval: Duration::from_millis(
                optional_u64("POLLING_INTERVAL_MS")?.unwrap_or(DEFAULT_POLLING_INTERVAL_MS),
            ),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./indexer.db".to_string()),
            rpc_max_retries,
        })
    }

    /// Backfill mode: any override start block turns the service into a
    /// one-shot job that exits once both chains are caught up.
    pub fn is_backfill(&self) -> bool {
        self.l1.override_start_block.is_some() || self.l2.override_start_block.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("NETWORK", "testnet".to_string()),
            (
                "L1_RPC_URLS",
                "http://localhost:8545, http://localhost:8546".to_string(),
            ),
            (
                "L1_PORTAL_ADDRESS",
                "0x1000000000000000000000000000000000000001".to_string(),
            ),
            (
                "L1_INBOX_ADDRESS",
                "0x2000000000000000000000000000000000000002".to_string(),
            ),
            (
                "L1_ALLOW_LIST_ADDRESS",
                "0x3000000000000000000000000000000000000003".to_string(),
            ),
            ("L2_NODE_URL", "http://localhost:8080".to_string()),
            ("L2_PORTAL_ADDRESS", format!("0x{}", "0a".repeat(32))),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.network, "testnet");
        assert_eq!(config.l1_rpc_urls.len(), 2);
        assert_eq!(config.l1.chunk_size, 1000);
        assert_eq!(config.l2.start_block, 0);
        assert_eq!(config.polling_interval, Duration::from_secs(12));
        assert_eq!(config.database_url, "sqlite:./indexer.db");
        assert!(!config.is_backfill());
    }

    #[test]
    fn missing_required_value_is_fatal() {
        let mut env = base_env();
        env.remove("L1_INBOX_ADDRESS");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("L1_INBOX_ADDRESS"));
    }

    #[test]
    fn malformed_l2_portal_is_rejected() {
        let mut env = base_env();
        env.insert("L2_PORTAL_ADDRESS", "0x1234".into());
        assert!(load(&env).is_err());
    }

    #[test]
    fn override_enables_backfill() {
        let mut env = base_env();
        env.insert("L2_OVERRIDE_START_BLOCK", "500".into());
        env.insert("L2_CHUNK_SIZE", "50".into());
        let config = load(&env).unwrap();
        assert_eq!(config.l2.override_start_block, Some(500));
        assert_eq!(config.l2.chunk_size, 50);
        assert!(config.is_backfill());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut env = base_env();
        env.insert("L1_CHUNK_SIZE", "0".into());
        assert!(load(&env).is_err());
    }
}
