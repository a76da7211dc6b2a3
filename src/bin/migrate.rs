use anyhow::{Context, Result};
use bridge_indexer::repository::{Chain, Database, ProgressRepository};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Create the indexer schema and optionally rewind scan cursors", long_about = None)]
struct Cli {
    /// Set the L1 cursor to this block, even if it moves backwards
    #[arg(long, value_name = "BLOCK")]
    reset_l1: Option<u64>,

    /// Set the L2 cursor to this block, even if it moves backwards
    #[arg(long, value_name = "BLOCK")]
    reset_l2: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./indexer.db".to_string());

    info!("Running migrations on database: {database_url}");
    let db = Database::new(&database_url)
        .with_context(|| format!("Failed to open database {database_url}"))?;
    info!("Migrations completed successfully");

    let progress = ProgressRepository::new(&db.conn);
    for (chain, block) in [(Chain::L1, cli.reset_l1), (Chain::L2, cli.reset_l2)] {
        if let Some(block) = block {
            let previous = progress.get(chain)?;
            progress.reset(chain, block)?;
            info!("{} cursor reset from {} to {}", chain, previous, block);
        }
    }

    Ok(())
}
