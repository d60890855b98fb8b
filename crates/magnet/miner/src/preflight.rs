//! One-time startup checks

use crate::{MinerConfig, MinerError};
use alloy_primitives::{utils::format_ether, Address, U256};
use magnet_chain::{ChainClient, ChainSession};
use tracing::info;

/// Balances read before mining starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightReport {
    /// Mining account
    pub address: Address,
    /// Wallet balance
    pub balance: U256,
    /// Contract pool balance
    pub pool_balance: U256,
    /// Reward per accepted solution
    pub reward: U256,
}

/// Check the wallet can pay for gas and the pool can pay rewards.
pub async fn preflight<C: ChainClient>(
    chain: &C,
    session: &C::Session,
    config: &MinerConfig,
) -> Result<PreflightReport, MinerError> {
    let balance = chain.balance(session).await?;
    info!(target: "magnet::miner", balance = %format_ether(balance), "Wallet balance");
    if balance < config.min_wallet_balance {
        return Err(MinerError::InsufficientBalance { balance, required: config.min_wallet_balance });
    }

    let reward = chain.free_reward(session).await?;
    info!(target: "magnet::miner", reward = %format_ether(reward), "Reward per solution");

    let pool_balance = chain.pool_balance(session).await?;
    info!(target: "magnet::miner", pool = %format_ether(pool_balance), "Pool balance");
    if pool_balance < config.min_pool_balance {
        return Err(MinerError::PoolUnderfunded {
            balance: pool_balance,
            required: config.min_pool_balance,
        });
    }

    Ok(PreflightReport { address: session.address(), balance, pool_balance, reward })
}
