//! Failure classification and retry policy
//!
//! Pure decision logic: nothing here performs I/O, so every branch can be
//! exercised with synthetic errors.

use crate::CycleError;
use magnet_chain::ChainError;
use std::{fmt, time::Duration};

/// Failure classes the orchestrator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Contract-level rejection (revert)
    Rejected,
    /// Endpoint unreachable
    Connectivity,
    /// Overflow or undecodable number in a remote response
    Numeric,
    /// Anything else
    Other,
}

impl FailureKind {
    /// Classify a failed cycle
    pub const fn classify(err: &CycleError) -> Self {
        match err {
            CycleError::Chain(err) => Self::classify_chain(err),
            CycleError::Search(magnet_pow::SearchError::ZeroDifficulty) => Self::Numeric,
            CycleError::Search(_) | CycleError::InvalidSolution { .. } => Self::Other,
        }
    }

    const fn classify_chain(err: &ChainError) -> Self {
        match err {
            ChainError::TransactionRejected { .. } => Self::Rejected,
            ChainError::Connectivity(_) => Self::Connectivity,
            ChainError::NumericFault(_) => Self::Numeric,
            ChainError::GasEstimation(_) |
            ChainError::ChainIdMismatch { .. } |
            ChainError::NoEndpoints |
            ChainError::InvalidEndpoint { .. } |
            ChainError::UnknownEndpoint { .. } |
            ChainError::Remote(_) => Self::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => f.write_str("rejected by contract"),
            Self::Connectivity => f.write_str("network error"),
            Self::Numeric => f.write_str("numeric overflow"),
            Self::Other => f.write_str("mining failed"),
        }
    }
}

/// Consecutive failed cycles. Reset by any fully successful cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    consecutive_failures: u32,
}

impl RetryState {
    /// Current count
    pub const fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Count one more failure and return the new count
    pub const fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// Forget all failures
    pub const fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

/// What to do after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Wait `delay`, optionally switching endpoint first, then start a new cycle
    Retry {
        /// Move to the next endpoint before retrying
        failover: bool,
        /// Pause before the next cycle
        delay: Duration,
    },
    /// Stop mining
    Terminate,
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_failures: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Terminate after `max_failures` consecutive failures, otherwise retry
    /// after `delay`.
    pub const fn new(max_failures: u32, delay: Duration) -> Self {
        Self { max_failures, delay }
    }

    /// Consecutive failures that terminate the miner
    pub const fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Record a failure of kind `kind` and decide how to recover
    pub const fn on_failure(&self, state: &mut RetryState, kind: FailureKind) -> Recovery {
        if state.record_failure() >= self.max_failures {
            return Recovery::Terminate;
        }
        Recovery::Retry { failover: matches!(kind, FailureKind::Connectivity), delay: self.delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use magnet_pow::SearchError;

    const DELAY: Duration = Duration::from_secs(5);

    #[test]
    fn test_classify() {
        let cases = [
            (
                CycleError::Chain(ChainError::TransactionRejected { tx_hash: None, reason: "x".into() }),
                FailureKind::Rejected,
            ),
            (CycleError::Chain(ChainError::Connectivity("refused".into())), FailureKind::Connectivity),
            (CycleError::Chain(ChainError::NumericFault("overflow".into())), FailureKind::Numeric),
            (CycleError::Chain(ChainError::GasEstimation("reverted".into())), FailureKind::Other),
            (CycleError::Chain(ChainError::Remote("boom".into())), FailureKind::Other),
            (CycleError::Search(SearchError::ZeroDifficulty), FailureKind::Numeric),
            (CycleError::Search(SearchError::Join("panicked".into())), FailureKind::Other),
            (CycleError::InvalidSolution { solution: U256::ZERO }, FailureKind::Other),
        ];

        for (err, expected) in cases {
            assert_eq!(FailureKind::classify(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_connectivity_fails_over() {
        let policy = RetryPolicy::new(5, DELAY);
        let mut state = RetryState::default();

        assert_eq!(
            policy.on_failure(&mut state, FailureKind::Connectivity),
            Recovery::Retry { failover: true, delay: DELAY }
        );
        assert_eq!(
            policy.on_failure(&mut state, FailureKind::Rejected),
            Recovery::Retry { failover: false, delay: DELAY }
        );
        assert_eq!(state.failures(), 2);
    }

    #[test]
    fn test_terminates_at_cap() {
        let policy = RetryPolicy::new(5, DELAY);
        let mut state = RetryState::default();

        for _ in 0..4 {
            assert!(matches!(policy.on_failure(&mut state, FailureKind::Other), Recovery::Retry { .. }));
        }
        assert_eq!(policy.on_failure(&mut state, FailureKind::Other), Recovery::Terminate);
        assert_eq!(state.failures(), 5);
    }

    #[test]
    fn test_reset_restores_budget() {
        let policy = RetryPolicy::new(2, DELAY);
        let mut state = RetryState::default();

        assert!(matches!(policy.on_failure(&mut state, FailureKind::Numeric), Recovery::Retry { .. }));
        state.reset();
        assert_eq!(state.failures(), 0);
        assert!(matches!(policy.on_failure(&mut state, FailureKind::Numeric), Recovery::Retry { .. }));
        assert_eq!(policy.on_failure(&mut state, FailureKind::Numeric), Recovery::Terminate);
    }
}
