use anyhow::Result;
use bridge_indexer::collector::{CollectorConfig, CollectorService};
use bridge_indexer::config::Config;
use bridge_indexer::repository::Database;
use bridge_indexer::rollup::RollupNode;
use bridge_indexer::rpc::RpcClient;
use bridge_indexer::scanner::{L1Contracts, L1Scanner, L2Scanner};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting token bridge collector");

    let config = Config::from_env()?;
    info!("Configuration loaded for network {}", config.network);
    info!("L1 portal: {:?}", config.l1_portal_address);
    info!("L2 portal: {}", config.l2_portal_address);
    info!(
        "L1 RPC URLs: {} endpoint(s) configured",
        config.l1_rpc_urls.len()
    );
    if config.is_backfill() {
        info!(
            "Backfill requested (L1 from {:?}, L2 from {:?})",
            config.l1.override_start_block, config.l2.override_start_block
        );
    }

    let db = Database::new(&config.database_url)?;
    info!("Database initialized");

    let l1_client = RpcClient::new(&config.l1_rpc_urls, config.rpc_max_retries)?;
    let l1_scanner = L1Scanner::new(
        l1_client,
        L1Contracts {
            portal: config.l1_portal_address,
            inbox: config.l1_inbox_address,
            allow_list: config.l1_allow_list_address,
        },
    );

    let l2_client = RollupNode::new(&config.l2_node_url, config.rpc_max_retries)?;
    let l2_scanner = L2Scanner::new(l2_client, config.l2_portal_address);
    info!("Chain clients connected");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal.cancel();
    });

    let mut service = CollectorService::new(
        db,
        l1_scanner,
        l2_scanner,
        CollectorConfig::from_config(&config),
    );

    if let Err(e) = service.run(shutdown).await {
        error!("Collector error: {}", e);
        return Err(e);
    }

    Ok(())
}
