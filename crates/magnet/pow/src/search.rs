//! Proof-of-work search implementation
//!
//! Candidates are tried in strictly increasing order from zero, so the first
//! solution is a pure function of `(nonce, address, difficulty)`.

use crate::{ProgressReporter, SearchCounters, SearchError, PREFIX_LEN, PREIMAGE_LEN};
use alloy_primitives::{keccak256, Address, B256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Exact `floor(2^256 / difficulty)`, saturating to [`U256::MAX`] for a
/// difficulty of one.
pub fn difficulty_to_threshold(difficulty: U256) -> Result<U256, SearchError> {
    if difficulty.is_zero() {
        return Err(SearchError::ZeroDifficulty);
    }
    // 2^256 = MAX + 1, so the quotient gains one exactly when the remainder
    // of MAX is difficulty - 1.
    let quotient = U256::MAX / difficulty;
    let remainder = U256::MAX % difficulty;
    if remainder + U256::from(1u8) == difficulty {
        Ok(quotient.saturating_add(U256::from(1u8)))
    } else {
        Ok(quotient)
    }
}

/// Inputs of a single search, as assigned by the mining contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchJob {
    /// Task nonce issued by the contract
    pub nonce: U256,
    /// Miner account the task is bound to
    pub address: Address,
    /// Task difficulty
    pub difficulty: U256,
}

impl SearchJob {
    /// Create a new search job
    pub const fn new(nonce: U256, address: Address, difficulty: U256) -> Self {
        Self { nonce, address, difficulty }
    }

    /// Tightly packed `(uint256 nonce, address account)`
    pub fn prefix(&self) -> [u8; PREFIX_LEN] {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix[..32].copy_from_slice(&self.nonce.to_be_bytes::<32>());
        prefix[32..].copy_from_slice(self.address.as_slice());
        prefix
    }

    /// Highest accepted hash value
    pub fn threshold(&self) -> Result<U256, SearchError> {
        difficulty_to_threshold(self.difficulty)
    }

    /// `keccak256(prefix || uint256 solution)`
    pub fn hash_candidate(&self, solution: U256) -> B256 {
        let mut preimage = [0u8; PREIMAGE_LEN];
        preimage[..PREFIX_LEN].copy_from_slice(&self.prefix());
        preimage[PREFIX_LEN..].copy_from_slice(&solution.to_be_bytes::<32>());
        keccak256(preimage)
    }

    /// Check a solution the same way the contract does
    pub fn verify(&self, solution: U256) -> bool {
        self.threshold().is_ok_and(|threshold| {
            U256::from_be_bytes(self.hash_candidate(solution).0) <= threshold
        })
    }
}

/// A solution satisfying the task threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// The winning candidate
    pub value: U256,
    /// Its hash
    pub hash: B256,
    /// Hashes computed to find it
    pub attempts: u64,
    /// Time taken to find it
    pub duration: Duration,
}

impl Solution {
    /// Get hashrate in H/s
    pub fn hashrate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 { self.attempts as f64 / secs } else { 0.0 }
    }
}

/// Result of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A solution was found
    Found(Solution),
    /// The deadline passed (or the candidate space ran out) first
    NotFound {
        /// Hashes computed before giving up
        attempts: u64,
    },
    /// The search was cancelled through a [`SearchHandle`]
    Cancelled {
        /// Hashes computed before cancellation
        attempts: u64,
    },
}

/// Cancels searches running on the [`HashSearch`] it was taken from.
#[derive(Debug, Clone)]
pub struct SearchHandle {
    cancelled: Arc<AtomicBool>,
}

impl SearchHandle {
    /// Stop the in-flight search. Every later search returns
    /// [`SearchOutcome::Cancelled`] immediately.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`Self::cancel`] was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Single-threaded Keccak-256 search engine
#[derive(Debug, Clone, Default)]
pub struct HashSearch {
    cancelled: Arc<AtomicBool>,
    counters: Arc<SearchCounters>,
}

impl HashSearch {
    /// Create a new search engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for cancelling searches from another task
    pub fn handle(&self) -> SearchHandle {
        SearchHandle { cancelled: Arc::clone(&self.cancelled) }
    }

    /// Counters of the current (or last) search
    pub fn counters(&self) -> Arc<SearchCounters> {
        Arc::clone(&self.counters)
    }

    /// Search `job` until a solution is found, `deadline` passes or the
    /// search is cancelled (blocking).
    ///
    /// Deadline and cancellation are checked before every candidate, so the
    /// call overruns the deadline by at most one hash computation.
    pub fn search(
        &self,
        job: &SearchJob,
        deadline: Option<Instant>,
    ) -> Result<SearchOutcome, SearchError> {
        let threshold = job.threshold()?;
        let start = Instant::now();
        self.counters.reset();

        debug!(
            target: "magnet::search",
            nonce = %job.nonce,
            address = %job.address,
            difficulty = %job.difficulty,
            "Starting search"
        );

        let mut preimage = [0u8; PREIMAGE_LEN];
        preimage[..PREFIX_LEN].copy_from_slice(&job.prefix());

        let mut solution = U256::ZERO;
        let mut attempts: u64 = 0;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Ok(SearchOutcome::Cancelled { attempts });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(SearchOutcome::NotFound { attempts });
            }

            preimage[PREFIX_LEN..].copy_from_slice(&solution.to_be_bytes::<32>());
            let hash = keccak256(preimage);
            attempts += 1;
            self.counters.record(attempts, &hash);

            if U256::from_be_bytes(hash.0) <= threshold {
                let duration = start.elapsed();
                info!(
                    target: "magnet::search",
                    nonce = %job.nonce,
                    solution = %solution,
                    hash = %hash,
                    attempts,
                    duration_ms = duration.as_millis(),
                    "Solution found"
                );
                return Ok(SearchOutcome::Found(Solution { value: solution, hash, attempts, duration }));
            }

            solution = match solution.checked_add(U256::from(1u8)) {
                Some(next) => next,
                None => return Ok(SearchOutcome::NotFound { attempts }),
            };
        }
    }

    /// Run [`Self::search`] on the blocking pool with a deadline `timeout`
    /// from now, logging progress every `progress_interval` meanwhile.
    pub async fn search_async(
        &self,
        job: SearchJob,
        timeout: Duration,
        progress_interval: Duration,
    ) -> Result<SearchOutcome, SearchError> {
        let deadline = Instant::now().checked_add(timeout);
        let search = self.clone();
        let reporter = ProgressReporter::new(self.counters(), progress_interval).spawn();

        let result =
            tokio::task::spawn_blocking(move || search.search(&job, deadline)).await;

        if let Some(reporter) = reporter {
            reporter.abort();
        }

        result.map_err(|err| SearchError::Join(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    const MINER: Address = address!("0x00000000000000000000000000000000deadbeef");

    fn found(outcome: SearchOutcome) -> Solution {
        match outcome {
            SearchOutcome::Found(solution) => solution,
            other => panic!("expected a solution, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_values() {
        assert_eq!(difficulty_to_threshold(U256::from(1u8)).unwrap(), U256::MAX);
        assert_eq!(difficulty_to_threshold(U256::from(2u8)).unwrap(), U256::from(1u8) << 255);
        assert_eq!(difficulty_to_threshold(U256::from(256u16)).unwrap(), U256::from(1u8) << 248);
        assert_eq!(difficulty_to_threshold(U256::from(3u8)).unwrap(), U256::MAX / U256::from(3u8));
        assert_eq!(difficulty_to_threshold(U256::MAX).unwrap(), U256::from(1u8));
        assert_matches!(difficulty_to_threshold(U256::ZERO), Err(SearchError::ZeroDifficulty));
    }

    #[test]
    fn test_prefix_packing() {
        let job = SearchJob::new(U256::from(0x0102u16), MINER, U256::from(1u8));
        let prefix = job.prefix();

        assert!(prefix[..30].iter().all(|b| *b == 0));
        assert_eq!(prefix[30], 0x01);
        assert_eq!(prefix[31], 0x02);
        assert_eq!(&prefix[32..], MINER.as_slice());
    }

    #[test]
    fn test_hash_candidate_matches_packed_preimage() {
        let job = SearchJob::new(U256::from(77u8), MINER, U256::from(10u8));
        let solution = U256::from(123_456u32);

        let mut packed = Vec::new();
        packed.extend_from_slice(&U256::from(77u8).to_be_bytes::<32>());
        packed.extend_from_slice(MINER.as_slice());
        packed.extend_from_slice(&solution.to_be_bytes::<32>());
        assert_eq!(packed.len(), PREIMAGE_LEN);

        assert_eq!(job.hash_candidate(solution), keccak256(&packed));
    }

    #[test]
    fn test_difficulty_one_accepts_zero() {
        let job = SearchJob::new(U256::from(5u8), MINER, U256::from(1u8));
        let solution = found(HashSearch::new().search(&job, None).unwrap());

        assert_eq!(solution.value, U256::ZERO);
        assert_eq!(solution.attempts, 1);
        assert!(job.verify(U256::ZERO));
    }

    #[test]
    fn test_search_is_deterministic() {
        let job = SearchJob::new(U256::from(987_654u32), MINER, U256::from(1000u16));
        let search = HashSearch::new();

        let first = found(search.search(&job, None).unwrap());
        let second = found(search.search(&job, None).unwrap());

        assert_eq!(first.value, second.value);
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.attempts, first.value.to::<u64>() + 1);
        assert_eq!(search.counters().attempts(), second.attempts);
    }

    #[test]
    fn test_first_solution_is_smallest() {
        let job = SearchJob::new(U256::from(3u8), MINER, U256::from(64u8));
        let solution = found(HashSearch::new().search(&job, None).unwrap());

        let value = solution.value.to::<u64>();
        for candidate in 0..value {
            assert!(!job.verify(U256::from(candidate)), "candidate {candidate} also satisfies");
        }
        assert!(job.verify(solution.value));
    }

    #[test]
    fn test_zero_difficulty_rejected() {
        let job = SearchJob::new(U256::ZERO, MINER, U256::ZERO);
        assert_matches!(HashSearch::new().search(&job, None), Err(SearchError::ZeroDifficulty));
        assert!(!job.verify(U256::ZERO));
    }

    #[test]
    fn test_deadline_enforced() {
        // threshold of one: practically unsolvable
        let job = SearchJob::new(U256::from(1u8), MINER, U256::MAX);
        let budget = Duration::from_millis(20);
        let start = Instant::now();

        let outcome = HashSearch::new().search(&job, Some(start + budget)).unwrap();

        assert_matches!(outcome, SearchOutcome::NotFound { attempts } if attempts > 0);
        assert!(start.elapsed() < budget + Duration::from_millis(250));
    }

    #[test]
    fn test_expired_deadline_hashes_nothing() {
        let job = SearchJob::new(U256::from(1u8), MINER, U256::from(1u8));
        let outcome = HashSearch::new().search(&job, Some(Instant::now())).unwrap();
        assert_eq!(outcome, SearchOutcome::NotFound { attempts: 0 });
    }

    #[test]
    fn test_cancelled_search() {
        let search = HashSearch::new();
        let handle = search.handle();
        handle.cancel();
        assert!(handle.is_cancelled());

        let job = SearchJob::new(U256::from(1u8), MINER, U256::from(1u8));
        assert_eq!(search.search(&job, None).unwrap(), SearchOutcome::Cancelled { attempts: 0 });
    }

    #[tokio::test]
    async fn test_search_async_finds_solution() {
        let job = SearchJob::new(U256::from(42u8), MINER, U256::from(16u8));
        let search = HashSearch::new();

        let outcome = search
            .search_async(job, Duration::from_secs(30), Duration::from_millis(10))
            .await
            .unwrap();
        let solution = found(outcome);

        assert!(job.verify(solution.value));

        let blocking = found(search.search(&job, None).unwrap());
        assert_eq!(solution.value, blocking.value);
        assert_eq!(solution.hash, blocking.hash);
        assert_eq!(solution.attempts, blocking.attempts);
    }

    #[tokio::test]
    async fn test_search_async_times_out() {
        let job = SearchJob::new(U256::from(42u8), MINER, U256::MAX);
        let outcome = HashSearch::new()
            .search_async(job, Duration::from_millis(10), Duration::ZERO)
            .await
            .unwrap();
        assert_matches!(outcome, SearchOutcome::NotFound { .. });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_found_hash_is_under_threshold(
            nonce in any::<u64>(),
            addr in any::<[u8; 20]>(),
            difficulty in 1u64..2_000,
        ) {
            let job = SearchJob::new(U256::from(nonce), Address::from(addr), U256::from(difficulty));
            let solution = found(HashSearch::new().search(&job, None).unwrap());
            let threshold = difficulty_to_threshold(U256::from(difficulty)).unwrap();

            prop_assert!(U256::from_be_bytes(solution.hash.0) <= threshold);
            prop_assert_eq!(solution.hash, job.hash_candidate(solution.value));
        }
    }
}
