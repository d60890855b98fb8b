//! Command line arguments

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use magnet_chain::{
    client::DEFAULT_GAS_MARGIN_PERCENT, ChainError, Endpoints, MAGNET_CHAIN_ID,
    MAGNET_MINING_CONTRACT,
};
use magnet_miner::MinerConfig;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Magnet PoW miner
#[derive(Debug, Parser)]
#[command(name = "magnet-miner", version)]
#[command(about = "Solves proof-of-work tasks issued by the Magnet mining contract")]
pub(crate) struct Args {
    /// Miner configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// RPC endpoint, in failover order. Repeat for several (default: public Magnet nodes)
    #[arg(long = "rpc", value_name = "URL")]
    pub(crate) rpc: Vec<Url>,

    /// Index of the endpoint to connect to first
    #[arg(long, default_value_t = 0)]
    pub(crate) endpoint_index: usize,

    /// Private key of the mining account
    #[arg(long, env = "MAGNET_PRIVATE_KEY", hide_env_values = true)]
    pub(crate) private_key: PrivateKeySigner,

    /// Mining contract address
    #[arg(long, default_value_t = MAGNET_MINING_CONTRACT)]
    pub(crate) contract: Address,

    /// Chain id the endpoints must serve
    #[arg(long, default_value_t = MAGNET_CHAIN_ID)]
    pub(crate) chain_id: u64,

    /// Give up on a task after this long (e.g. "10m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) mining_timeout: Option<Duration>,

    /// Consecutive failed cycles before exiting
    #[arg(long)]
    pub(crate) max_failures: Option<u32>,

    /// Exit after this many rewarded solutions
    #[arg(long)]
    pub(crate) rewards: Option<u64>,

    /// Timeout for each RPC request
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub(crate) request_timeout: Duration,

    /// How long to wait for a transaction to be mined
    #[arg(long, value_parser = humantime::parse_duration, default_value = "2m")]
    pub(crate) confirmation_timeout: Duration,

    /// Gas limit as a percentage of the node's estimate
    #[arg(long, default_value_t = DEFAULT_GAS_MARGIN_PERCENT)]
    pub(crate) gas_margin: u64,

    /// Log filter directives
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub(crate) log_filter: String,
}

impl Args {
    /// Configuration file (or defaults) with command line overrides applied
    pub(crate) fn miner_config(&self) -> eyre::Result<MinerConfig> {
        let mut config = match &self.config {
            Some(path) => MinerConfig::load(path)?,
            None => MinerConfig::default(),
        };

        if let Some(timeout) = self.mining_timeout {
            config.mining_timeout = timeout;
        }
        if let Some(max_failures) = self.max_failures {
            config.max_consecutive_failures = max_failures;
        }
        if let Some(rewards) = self.rewards {
            config.max_rewards = Some(rewards);
        }

        config.validate()?;
        Ok(config)
    }

    /// Endpoints given on the command line, or the public Magnet nodes
    pub(crate) fn endpoints(&self) -> Result<Endpoints, ChainError> {
        if self.rpc.is_empty() {
            return Endpoints::magnet();
        }
        Endpoints::new(self.rpc.clone())
    }
}
