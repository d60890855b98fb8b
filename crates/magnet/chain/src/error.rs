//! Chain client error types
//!
//! Alloy errors are classified once, at the boundary, into the handful of
//! failure kinds the mining loop reacts to differently.

use alloy_json_rpc::RpcError;
use alloy_primitives::TxHash;
use alloy_provider::PendingTransactionError;
use alloy_transport::TransportError;
use thiserror::Error;

/// Errors that can occur while talking to the mining contract
#[derive(Debug, Error)]
pub enum ChainError {
    /// The contract reverted the call or transaction
    #[error("Transaction rejected by contract: {reason}")]
    TransactionRejected {
        /// Hash of the mined, reverted transaction (if it got that far)
        tx_hash: Option<TxHash>,
        /// Revert reason reported by the node
        reason: String,
    },

    /// Pre-flight gas estimation failed
    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    /// Endpoint unreachable, timed out or dropped the connection
    #[error("Endpoint unreachable: {0}")]
    Connectivity(String),

    /// A numeric response could not be represented
    #[error("Numeric fault: {0}")]
    NumericFault(String),

    /// Endpoint serves a different chain
    #[error("Endpoint {endpoint} serves chain {actual}, expected {expected}")]
    ChainIdMismatch {
        /// Endpoint that was probed
        endpoint: String,
        /// Configured chain id
        expected: u64,
        /// Chain id reported by the endpoint
        actual: u64,
    },

    /// Endpoint list is empty
    #[error("No RPC endpoints configured")]
    NoEndpoints,

    /// Endpoint URL did not parse
    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidEndpoint {
        /// Offending input
        url: String,
        /// Parser message
        reason: String,
    },

    /// Endpoint index outside the configured list
    #[error("Endpoint index {index} out of range (have {count})")]
    UnknownEndpoint {
        /// Requested index
        index: usize,
        /// Number of configured endpoints
        count: usize,
    },

    /// Any other error reported by the node
    #[error("Remote error: {0}")]
    Remote(String),
}

impl ChainError {
    /// Whether the error means the endpoint itself is unusable
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Whether the contract rejected the request
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::TransactionRejected { .. })
    }

    /// Wrap a failed `eth_estimateGas`. Connectivity failures stay as they
    /// are so they still trigger failover.
    pub fn gas_estimation(err: impl Into<Self>) -> Self {
        match err.into() {
            err @ Self::Connectivity(_) => err,
            err => Self::GasEstimation(err.to_string()),
        }
    }
}

fn is_revert(message: &str) -> bool {
    message.to_ascii_lowercase().contains("revert")
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::Transport(kind) => Self::Connectivity(kind.to_string()),
            RpcError::ErrorResp(payload) if is_revert(&payload.message) => {
                Self::TransactionRejected { tx_hash: None, reason: payload.message.to_string() }
            }
            RpcError::ErrorResp(payload) => Self::Remote(payload.to_string()),
            RpcError::DeserError { err, text } => {
                Self::NumericFault(format!("undecodable response {text:?}: {err}"))
            }
            other => Self::Remote(other.to_string()),
        }
    }
}

impl From<PendingTransactionError> for ChainError {
    fn from(err: PendingTransactionError) -> Self {
        match err {
            PendingTransactionError::TransportError(err) => err.into(),
            // watcher failures (timeouts, dropped subscriptions) mean the
            // endpoint stopped answering
            other => Self::Connectivity(other.to_string()),
        }
    }
}

impl From<alloy_contract::Error> for ChainError {
    fn from(err: alloy_contract::Error) -> Self {
        match err {
            alloy_contract::Error::TransportError(err) => err.into(),
            alloy_contract::Error::AbiError(err) => Self::NumericFault(err.to_string()),
            other => Self::Remote(other.to_string()),
        }
    }
}
