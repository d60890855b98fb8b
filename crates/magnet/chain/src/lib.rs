//! Magnet mining contract client
//!
//! Wraps the mining contract and the generic ledger calls the miner needs,
//! and owns the RPC connection the calls go through.
//!
//! A [`Session`] binds one endpoint, the signing key and the contract handle.
//! Sessions are immutable: on connectivity failure [`SessionManager::failover`]
//! returns a fresh session on the next endpoint and the caller swaps it in
//! wholesale.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod client;
pub mod contract;
pub mod endpoint;
pub mod error;
pub mod session;

pub use client::{ChainClient, RpcChainClient};
pub use contract::{MiningContract, MAGNET_CHAIN_ID, MAGNET_MINING_CONTRACT};
pub use endpoint::{Endpoints, MAGNET_RPC_ENDPOINTS};
pub use error::ChainError;
pub use session::{EndpointFailover, Session, SessionManager};

use alloy_primitives::{Address, TxHash, U256};

/// Connection state every chain call runs against
pub trait ChainSession: Clone + Send + Sync + 'static {
    /// Account the session signs for
    fn address(&self) -> Address;

    /// Index of the bound endpoint in the endpoint list
    fn endpoint_index(&self) -> usize;

    /// Bound endpoint, for reporting
    fn endpoint(&self) -> &str;
}

/// Snapshot of the caller's task as reported by `getMyTask()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningTask {
    /// Per-task nonce mixed into the hash
    pub nonce: U256,
    /// Task difficulty
    pub difficulty: U256,
    /// Whether the task can still be solved
    pub active: bool,
}

impl MiningTask {
    /// Whether this snapshot is still the active task with `nonce`
    pub fn is_current(&self, nonce: U256) -> bool {
        self.active && self.nonce == nonce
    }
}

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: Option<u64>,
    /// Gas consumed
    pub gas_used: u64,
    /// Reward from a `MiningReward` event, if one was emitted
    pub reward: Option<U256>,
}
