//! Magnet Miner Binary
//!
//! Requests proof-of-work tasks from the Magnet mining contract, solves them
//! and submits the solutions until interrupted or out of retries.
//!
//! Usage:
//!   MAGNET_PRIVATE_KEY=0x... magnet-miner --rewards 10

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cli;

use clap::Parser;
use cli::Args;
use magnet_chain::{ChainClient, RpcChainClient, SessionManager};
use magnet_miner::{preflight, Orchestrator};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = init_tracing(&args.log_filter) {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn init_tracing(filter: &str) -> eyre::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: Args) -> eyre::Result<()> {
    let config = args.miner_config()?;
    let endpoints = args.endpoints()?;

    let sessions = SessionManager::new(endpoints, args.private_key.clone(), args.contract)
        .with_request_timeout(args.request_timeout)
        .with_chain_id(args.chain_id);
    let chain = RpcChainClient::new()
        .with_gas_margin_percent(args.gas_margin)
        .with_confirmation_timeout(args.confirmation_timeout);

    let session = sessions.connect(args.endpoint_index).await?;
    let chain_id = chain.chain_id(&session).await?;
    info!(
        target: "magnet::cli",
        chain_id,
        address = %sessions.address(),
        endpoint = %session.url(),
        contract = %args.contract,
        "Connected"
    );

    preflight(&chain, &session, &config).await?;

    let mut orchestrator = Orchestrator::new(chain, sessions, session, config);
    let search = orchestrator.search_handle();

    tokio::select! {
        result = orchestrator.run() => {
            let summary = result?;
            info!(
                target: "magnet::cli",
                rewards = summary.rewards,
                cycles = summary.cycles,
                "Mining finished"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            search.cancel();
            warn!(target: "magnet::cli", "Interrupted, shutting down");
        }
    }

    Ok(())
}
