//! Magnet proof-of-work search
//!
//! This crate provides the brute-force nonce search performed for every
//! mining task handed out by the Magnet mining contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MAGNET POW SEARCH                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Search Job                                              │   │
//! │   │  • prefix = nonce (32 bytes BE) || miner address (20)    │   │
//! │   │  • threshold = floor(2^256 / difficulty)                 │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │                                  │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Candidate Loop (blocking pool)                          │   │
//! │   │  • keccak256(prefix || solution) for solution = 0, 1, .. │   │
//! │   │  • deadline + cancellation checked every candidate       │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │                                  │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Progress Telemetry (tokio interval)                     │   │
//! │   │  • reads shared counters only                            │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod search;
pub mod telemetry;

pub use search::{
    difficulty_to_threshold, HashSearch, SearchHandle, SearchJob, SearchOutcome, Solution,
};
pub use telemetry::{ProgressReporter, ProgressSample, ProgressSampler, SearchCounters};

use thiserror::Error;

/// Length of the packed `(nonce, address)` prefix.
pub const PREFIX_LEN: usize = 32 + 20;

/// Length of the full hash preimage `(prefix, solution)`.
pub const PREIMAGE_LEN: usize = PREFIX_LEN + 32;

/// Search errors
#[derive(Debug, Error)]
pub enum SearchError {
    /// Difficulty of zero has no threshold
    #[error("Difficulty must be non-zero")]
    ZeroDifficulty,

    /// The blocking search task panicked or was aborted
    #[error("Search task failed: {0}")]
    Join(String),
}
