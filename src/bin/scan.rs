use anyhow::Result;
use bridge_indexer::config::Config;
use bridge_indexer::dry_run::OutputFormat;
use bridge_indexer::dry_run::commands::{
    BlockRange, cmd_allow_list, cmd_heads, cmd_l1_registrations, cmd_l2_registrations,
};
use bridge_indexer::rollup::RollupNode;
use bridge_indexer::rpc::RpcClient;
use bridge_indexer::scanner::{L1Contracts, L1Scanner, L2Scanner};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scan")]
#[command(about = "Scan bridge registrations without writing to the database", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long)]
    from: u64,

    /// Defaults to the current head
    #[arg(long)]
    to: Option<u64>,

    /// Only show records for this L1 token
    #[arg(long)]
    token: Option<String>,
}

impl RangeArgs {
    fn range(&self) -> BlockRange {
        BlockRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Portal registrations correlated with inbox messages
    L1(RangeArgs),
    /// Allow-list status changes
    AllowList(RangeArgs),
    /// Rollup portal registrations
    L2(RangeArgs),
    /// Current head of both chains
    Heads,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;

    let l1 = L1Scanner::new(
        RpcClient::new(&config.l1_rpc_urls, config.rpc_max_retries)?,
        L1Contracts {
            portal: config.l1_portal_address,
            inbox: config.l1_inbox_address,
            allow_list: config.l1_allow_list_address,
        },
    );
    let l2 = L2Scanner::new(
        RollupNode::new(&config.l2_node_url, config.rpc_max_retries)?,
        config.l2_portal_address,
    );

    match cli.command {
        Commands::L1(args) => {
            cmd_l1_registrations(&l1, args.range(), args.token.as_deref(), &format).await?;
        }
        Commands::AllowList(args) => {
            cmd_allow_list(&l1, args.range(), args.token.as_deref(), &format).await?;
        }
        Commands::L2(args) => {
            cmd_l2_registrations(&l2, args.range(), args.token.as_deref(), &format).await?;
        }
        Commands::Heads => {
            cmd_heads(&l1, &l2, &format).await?;
        }
    }

    Ok(())
}
