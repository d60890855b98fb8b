//! Magnet mining loop
//!
//! Drives the request → search → verify → submit cycle against the mining
//! contract and decides how to recover when a cycle fails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MAGNET MINER                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Orchestrator                                           │   │
//! │   │  • requestMiningTask / getMyTask                        │   │
//! │   │  • keccak search with deadline                          │   │
//! │   │  • re-verify task, check pool, submitMiningResult       │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │ CycleError                       │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Retry policy                                           │   │
//! │   │  • classify: rejected / connectivity / numeric / other  │   │
//! │   │  • retry after delay, failover on connectivity          │   │
//! │   │  • terminate after N consecutive failures               │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod config;
pub mod orchestrator;
pub mod policy;
pub mod preflight;

pub use config::MinerConfig;
pub use orchestrator::{CycleOutcome, MiningState, Orchestrator, RestartReason, RunSummary};
pub use policy::{FailureKind, Recovery, RetryPolicy, RetryState};
pub use preflight::{preflight, PreflightReport};

use alloy_primitives::U256;
use magnet_chain::ChainError;
use magnet_pow::SearchError;
use thiserror::Error;

/// Failure of a single mining cycle
#[derive(Debug, Error)]
pub enum CycleError {
    /// Chain call failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Search could not run
    #[error(transparent)]
    Search(#[from] SearchError),

    /// A found solution failed local verification
    #[error("Solution {solution} does not satisfy the task threshold")]
    InvalidSolution {
        /// Rejected candidate
        solution: U256,
    },
}

/// Miner errors
#[derive(Debug, Error)]
pub enum MinerError {
    /// Invalid or unreadable configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Chain call outside the mining cycle failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Consecutive failure cap reached
    #[error("Giving up after {failures} consecutive failures: {last_error}")]
    RetriesExhausted {
        /// Failures counted
        failures: u32,
        /// Failure that hit the cap
        #[source]
        last_error: CycleError,
    },

    /// Wallet cannot pay for gas
    #[error("Insufficient wallet balance: {balance} wei, requires at least {required} wei")]
    InsufficientBalance {
        /// Current balance
        balance: U256,
        /// Configured minimum
        required: U256,
    },

    /// Contract pool cannot pay rewards
    #[error("Insufficient contract balance: {balance} wei, requires at least {required} wei")]
    PoolUnderfunded {
        /// Current pool balance
        balance: U256,
        /// Configured minimum
        required: U256,
    },
}
