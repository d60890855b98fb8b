//! Miner configuration

use crate::MinerError;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// One ether in wei
const ETHER: u64 = 1_000_000_000_000_000_000;

/// Mining loop configuration.
///
/// Durations are written in humantime form (`"10m"`, `"5s"`) in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinerConfig {
    /// Give up searching a task after this long
    #[serde(with = "humantime_serde")]
    pub mining_timeout: Duration,
    /// Wait after a classified failure before the next cycle
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Wait after the contract reports no active task
    #[serde(with = "humantime_serde")]
    pub inactive_task_delay: Duration,
    /// Wait before resubmitting a solution whose submission failed
    #[serde(with = "humantime_serde")]
    pub submit_retry_delay: Duration,
    /// Submission attempts per solution before the cycle fails
    pub max_submit_attempts: u32,
    /// Consecutive failed cycles before the miner stops
    pub max_consecutive_failures: u32,
    /// Pool balance (wei) below which solutions are not submitted
    pub min_pool_balance: U256,
    /// Wallet balance (wei) required to start mining
    pub min_wallet_balance: U256,
    /// Progress log cadence during a search; zero disables it
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    /// Stop after this many rewarded submissions (unlimited if unset)
    pub max_rewards: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            mining_timeout: Duration::from_secs(600),
            retry_delay: Duration::from_secs(5),
            inactive_task_delay: Duration::from_secs(5),
            submit_retry_delay: Duration::from_secs(5),
            max_submit_attempts: 3,
            max_consecutive_failures: 5,
            min_pool_balance: U256::from(3 * ETHER),
            min_wallet_balance: U256::from(ETHER / 10),
            progress_interval: Duration::from_secs(1),
            max_rewards: None,
        }
    }
}

impl MinerConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MinerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| MinerError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, MinerError> {
        let config: Self =
            toml::from_str(contents).map_err(|err| MinerError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the mining loop cannot run with
    pub fn validate(&self) -> Result<(), MinerError> {
        if self.max_consecutive_failures == 0 {
            return Err(MinerError::Config("max_consecutive_failures must be at least 1".into()));
        }
        if self.max_submit_attempts == 0 {
            return Err(MinerError::Config("max_submit_attempts must be at least 1".into()));
        }
        if self.mining_timeout.is_zero() {
            return Err(MinerError::Config("mining_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Configuration with every delay zeroed, for driving the loop in tests
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            inactive_task_delay: Duration::ZERO,
            submit_retry_delay: Duration::ZERO,
            progress_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}
