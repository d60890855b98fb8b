//! Search progress telemetry
//!
//! The candidate loop only bumps plain atomic counters. A separate tokio task
//! samples them on a fixed interval and logs attempts, instantaneous hashrate
//! and the head of the most recent hash.

use alloy_primitives::B256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Counters shared between the search loop and the progress reporter.
#[derive(Debug, Default)]
pub struct SearchCounters {
    attempts: AtomicU64,
    last_hash_head: AtomicU64,
}

impl SearchCounters {
    /// Create zeroed counters
    pub const fn new() -> Self {
        Self { attempts: AtomicU64::new(0), last_hash_head: AtomicU64::new(0) }
    }

    /// Hashes computed for the current job
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Most significant 64 bits of the last computed hash
    pub fn last_hash_head(&self) -> u64 {
        self.last_hash_head.load(Ordering::Relaxed)
    }

    pub(crate) fn record(&self, attempts: u64, hash: &B256) {
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash[..8]);
        self.attempts.store(attempts, Ordering::Relaxed);
        self.last_hash_head.store(u64::from_be_bytes(head), Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.last_hash_head.store(0, Ordering::Relaxed);
    }
}

/// A single progress reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Total attempts so far
    pub attempts: u64,
    /// Hashes per second since the previous sample
    pub hashrate: f64,
    /// Most significant 64 bits of the last hash
    pub last_hash_head: u64,
}

/// Turns successive counter readings into instantaneous rates.
#[derive(Debug, Clone)]
pub struct ProgressSampler {
    last_attempts: u64,
    last_at: Instant,
}

impl ProgressSampler {
    /// Start sampling from `now`
    pub const fn new(now: Instant) -> Self {
        Self { last_attempts: 0, last_at: now }
    }

    /// Take a reading of `counters` at `now`
    pub fn sample(&mut self, counters: &SearchCounters, now: Instant) -> ProgressSample {
        let attempts = counters.attempts();
        let elapsed = now.saturating_duration_since(self.last_at).as_secs_f64();
        let delta = attempts.saturating_sub(self.last_attempts);
        let hashrate = if elapsed > 0.0 { delta as f64 / elapsed } else { 0.0 };

        self.last_attempts = attempts;
        self.last_at = now;

        ProgressSample { attempts, hashrate, last_hash_head: counters.last_hash_head() }
    }
}

/// Periodically logs search progress until aborted.
#[derive(Debug)]
pub struct ProgressReporter {
    counters: Arc<SearchCounters>,
    interval: Duration,
}

impl ProgressReporter {
    /// Create a reporter over `counters` ticking every `interval`
    pub const fn new(counters: Arc<SearchCounters>, interval: Duration) -> Self {
        Self { counters, interval }
    }

    /// Spawn the reporter. Returns `None` for a zero interval.
    ///
    /// The task never finishes on its own; abort the handle when the search
    /// completes.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            return None;
        }
        Some(tokio::spawn(self.run()))
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        let mut sampler = ProgressSampler::new(Instant::now());
        loop {
            ticker.tick().await;
            let sample = sampler.sample(&self.counters, Instant::now());
            info!(
                target: "magnet::search",
                attempts = sample.attempts,
                hashrate = format!("{:.2} H/s", sample.hashrate),
                last_hash = format!("0x{:016x}…", sample.last_hash_head),
                "Searching"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_record_hash_head() {
        let counters = SearchCounters::new();
        let mut hash = B256::ZERO;
        hash[0] = 0xab;
        hash[7] = 0xcd;
        hash[8] = 0xff;

        counters.record(42, &hash);
        assert_eq!(counters.attempts(), 42);
        assert_eq!(counters.last_hash_head(), 0xab00_0000_0000_00cd);

        counters.reset();
        assert_eq!(counters.attempts(), 0);
        assert_eq!(counters.last_hash_head(), 0);
    }

    #[test]
    fn test_sampler_instantaneous_rate() {
        let counters = SearchCounters::new();
        let start = Instant::now();
        let mut sampler = ProgressSampler::new(start);

        counters.record(500, &B256::ZERO);
        let first = sampler.sample(&counters, start + Duration::from_secs(1));
        assert_eq!(first.attempts, 500);
        assert!((first.hashrate - 500.0).abs() < 1e-9);

        // rate only covers the latest window
        counters.record(700, &B256::ZERO);
        let second = sampler.sample(&counters, start + Duration::from_secs(3));
        assert!((second.hashrate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sampler_zero_elapsed() {
        let counters = SearchCounters::new();
        let start = Instant::now();
        let mut sampler = ProgressSampler::new(start);
        counters.record(10, &B256::ZERO);
        assert_eq!(sampler.sample(&counters, start).hashrate, 0.0);
    }

    #[tokio::test]
    async fn test_zero_interval_not_spawned() {
        let reporter = ProgressReporter::new(Arc::new(SearchCounters::new()), Duration::ZERO);
        assert!(reporter.spawn().is_none());
    }
}
