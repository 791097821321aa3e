//! tidewater-node — waterfall settlement service.

mod api;
mod config;
mod storage;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tidewater_ledger::adapters::{JsonRpcGateway, MockLedger};
use tidewater_ledger::LedgerGateway;
use tidewater_settlement::{RecoveryLedger, SettlementOrchestrator};

use crate::config::NodeConfig;
use crate::storage::RocksStore;

#[derive(Parser)]
#[command(name = "tidewater-node", version, about = "Waterfall settlement service")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run against an in-memory mock ledger instead of the configured
    /// JSON-RPC endpoint (local demos and development).
    #[arg(long)]
    mock_ledger: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let store = Arc::new(RocksStore::open(Path::new(&config.data_dir))?);
    let ledger = Arc::new(RecoveryLedger::load(store).await?);

    let gateway: Arc<dyn LedgerGateway> = if cli.mock_ledger {
        tracing::warn!("running against the in-memory mock ledger");
        Arc::new(MockLedger::new())
    } else {
        tracing::info!(endpoint = %config.ledger_endpoint, "using JSON-RPC ledger gateway");
        Arc::new(JsonRpcGateway::new(config.ledger_endpoint.as_str()))
    };

    let orchestrator = Arc::new(SettlementOrchestrator::new(
        gateway,
        ledger,
        config.settlement_policy(),
    ));

    let listen_addr: SocketAddr = config.api_listen.parse()?;
    api::start_api_server(listen_addr, orchestrator).await
}
