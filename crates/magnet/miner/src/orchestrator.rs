//! Mining cycle state machine

use crate::{
    CycleError, FailureKind, MinerConfig, MinerError, Recovery, RetryPolicy, RetryState,
};
use alloy_primitives::{utils::format_ether, U256};
use magnet_chain::{ChainClient, ChainSession, EndpointFailover, TxReceipt};
use magnet_pow::{HashSearch, SearchHandle, SearchJob, SearchOutcome};
use std::{fmt, time::Duration};
use tracing::{debug, error, info, warn};

/// Where the orchestrator currently is in the mining cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    /// Sending `requestMiningTask()`
    RequestingTask,
    /// Reading the assigned task
    FetchingTask,
    /// Hash search in progress
    Searching,
    /// Confirming the mined task is still current
    VerifyingTask,
    /// Confirming the pool can pay the reward
    CheckingPoolBalance,
    /// Sending `submitMiningResult()`
    Submitting,
    /// Last cycle was rewarded
    Cooldown,
    /// Classifying a failed cycle
    HandlingFailure,
    /// Mining stopped
    Terminated,
}

impl fmt::Display for MiningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a cycle ended early without counting as a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The contract reported no active task
    InactiveTask,
    /// No solution before the mining timeout
    SearchTimedOut,
    /// The task changed or expired while searching
    StaleTask,
    /// Pool balance below the configured minimum
    PoolUnderfunded,
    /// Search was cancelled
    Cancelled,
}

/// Successful end of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Solution accepted
    Rewarded {
        /// Confirmed submission
        receipt: TxReceipt,
        /// Wallet balance after the reward, if it could be read
        balance: Option<U256>,
    },
    /// Start over without touching the failure count
    Restart(RestartReason),
}

/// Totals reported when [`Orchestrator::run`] stops without error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rewarded submissions
    pub rewards: u64,
    /// Cycles started
    pub cycles: u64,
}

/// Runs mining cycles for one signing identity.
///
/// Holds the only live session. After a failover the previous session is
/// dropped and every later call goes through the replacement.
pub struct Orchestrator<C, F>
where
    C: ChainClient,
    F: EndpointFailover<Session = C::Session>,
{
    chain: C,
    sessions: F,
    session: C::Session,
    config: MinerConfig,
    policy: RetryPolicy,
    retry: RetryState,
    search: HashSearch,
    state: MiningState,
}

impl<C, F> Orchestrator<C, F>
where
    C: ChainClient,
    F: EndpointFailover<Session = C::Session>,
{
    /// Create an orchestrator starting on `session`
    pub fn new(chain: C, sessions: F, session: C::Session, config: MinerConfig) -> Self {
        let policy = RetryPolicy::new(config.max_consecutive_failures, config.retry_delay);
        Self {
            chain,
            sessions,
            session,
            config,
            policy,
            retry: RetryState::default(),
            search: HashSearch::new(),
            state: MiningState::RequestingTask,
        }
    }

    /// Current state
    pub const fn state(&self) -> MiningState {
        self.state
    }

    /// Session all calls currently go through
    pub const fn session(&self) -> &C::Session {
        &self.session
    }

    /// Consecutive failure count
    pub const fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// Handle that cancels the running search and stops [`Self::run`]
    pub fn search_handle(&self) -> SearchHandle {
        self.search.handle()
    }

    /// Mine until the reward cap is reached, the search is cancelled or the
    /// consecutive failure cap is hit.
    pub async fn run(&mut self) -> Result<RunSummary, MinerError> {
        let mut summary = RunSummary::default();

        info!(
            target: "magnet::miner",
            address = %self.session.address(),
            endpoint = self.session.endpoint(),
            max_failures = self.policy.max_failures(),
            "Mining started"
        );

        loop {
            if self.search.handle().is_cancelled() {
                info!(target: "magnet::miner", rewards = summary.rewards, "Mining stopped");
                self.state = MiningState::Terminated;
                return Ok(summary);
            }
            if self.config.max_rewards.is_some_and(|max| summary.rewards >= max) {
                info!(target: "magnet::miner", rewards = summary.rewards, "Reward target reached");
                self.state = MiningState::Terminated;
                return Ok(summary);
            }

            summary.cycles += 1;
            match self.run_cycle().await {
                Ok(CycleOutcome::Rewarded { receipt, balance }) => {
                    self.retry.reset();
                    summary.rewards += 1;
                    self.state = MiningState::Cooldown;
                    info!(
                        target: "magnet::miner",
                        tx_hash = %receipt.tx_hash,
                        reward = ?receipt.reward.map(format_ether),
                        balance = ?balance.map(format_ether),
                        rewards = summary.rewards,
                        "Solution accepted"
                    );
                }
                Ok(CycleOutcome::Restart(reason)) => {
                    debug!(target: "magnet::miner", ?reason, "Restarting cycle");
                    if reason == RestartReason::InactiveTask {
                        pause(self.config.inactive_task_delay).await;
                    }
                }
                Err(err) => {
                    self.state = MiningState::HandlingFailure;
                    let kind = FailureKind::classify(&err);
                    match self.policy.on_failure(&mut self.retry, kind) {
                        Recovery::Retry { failover, delay } => {
                            warn!(
                                target: "magnet::miner",
                                %kind,
                                error = %err,
                                failures = self.retry.failures(),
                                max_failures = self.policy.max_failures(),
                                retry_in = ?delay,
                                "Mining cycle failed"
                            );
                            if failover {
                                self.failover().await;
                            }
                            pause(delay).await;
                        }
                        Recovery::Terminate => {
                            error!(
                                target: "magnet::miner",
                                %kind,
                                error = %err,
                                failures = self.retry.failures(),
                                "Max attempts reached, stopping"
                            );
                            self.state = MiningState::Terminated;
                            return Err(MinerError::RetriesExhausted {
                                failures: self.retry.failures(),
                                last_error: err,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Run one request → search → verify → submit cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        self.state = MiningState::RequestingTask;
        let request = self.chain.request_task(&self.session).await?;
        debug!(target: "magnet::miner", tx_hash = %request.tx_hash, "Task requested");

        self.state = MiningState::FetchingTask;
        let task = self.chain.fetch_task(&self.session).await?;
        if !task.active {
            info!(target: "magnet::miner", "No active task, waiting");
            return Ok(CycleOutcome::Restart(RestartReason::InactiveTask));
        }

        info!(
            target: "magnet::miner",
            nonce = %task.nonce,
            difficulty = %task.difficulty,
            "Mining task"
        );

        self.state = MiningState::Searching;
        let job = SearchJob::new(task.nonce, self.session.address(), task.difficulty);
        let solution = match self
            .search
            .search_async(job, self.config.mining_timeout, self.config.progress_interval)
            .await?
        {
            SearchOutcome::Found(solution) => solution,
            SearchOutcome::NotFound { attempts } => {
                warn!(
                    target: "magnet::miner",
                    nonce = %task.nonce,
                    attempts,
                    timeout = ?self.config.mining_timeout,
                    "Mining timed out, requesting a new task"
                );
                return Ok(CycleOutcome::Restart(RestartReason::SearchTimedOut));
            }
            SearchOutcome::Cancelled { .. } => {
                return Ok(CycleOutcome::Restart(RestartReason::Cancelled));
            }
        };

        self.submit(&job, solution.value).await
    }

    /// Verify and submit `solution`, retrying the same task on failure.
    async fn submit(&mut self, job: &SearchJob, solution: U256) -> Result<CycleOutcome, CycleError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            self.state = MiningState::VerifyingTask;
            let current = self.chain.fetch_task(&self.session).await?;
            if !current.is_current(job.nonce) {
                info!(
                    target: "magnet::miner",
                    mined = %job.nonce,
                    current = %current.nonce,
                    active = current.active,
                    "Task changed, discarding solution"
                );
                return Ok(CycleOutcome::Restart(RestartReason::StaleTask));
            }
            if !job.verify(solution) {
                return Err(CycleError::InvalidSolution { solution });
            }

            self.state = MiningState::CheckingPoolBalance;
            let pool = self.chain.pool_balance(&self.session).await?;
            if pool < self.config.min_pool_balance {
                warn!(
                    target: "magnet::miner",
                    pool = %format_ether(pool),
                    required = %format_ether(self.config.min_pool_balance),
                    "Pool balance too low, skipping submission"
                );
                return Ok(CycleOutcome::Restart(RestartReason::PoolUnderfunded));
            }

            self.state = MiningState::Submitting;
            match self.chain.submit_solution(&self.session, solution).await {
                Ok(receipt) => {
                    let balance = match self.chain.balance(&self.session).await {
                        Ok(balance) => Some(balance),
                        Err(err) => {
                            warn!(target: "magnet::miner", error = %err, "Failed to read balance");
                            None
                        }
                    };
                    return Ok(CycleOutcome::Rewarded { receipt, balance });
                }
                Err(err) if attempt < self.config.max_submit_attempts => {
                    warn!(
                        target: "magnet::miner",
                        error = %err,
                        attempt,
                        max_attempts = self.config.max_submit_attempts,
                        "Submission failed, retrying same task"
                    );
                    if err.is_connectivity() {
                        self.failover().await;
                    }
                    pause(self.config.submit_retry_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Swap in a session on the next reachable endpoint. The current session
    /// is kept when no endpoint answers.
    async fn failover(&mut self) {
        match self.sessions.failover(&self.session).await {
            Ok(session) => {
                info!(
                    target: "magnet::miner",
                    from = self.session.endpoint(),
                    to = session.endpoint(),
                    "Switched endpoint"
                );
                self.session = session;
            }
            Err(err) => {
                warn!(
                    target: "magnet::miner",
                    endpoint = self.session.endpoint(),
                    error = %err,
                    "No endpoint reachable, keeping current session"
                );
            }
        }
    }
}

impl<C, F> fmt::Debug for Orchestrator<C, F>
where
    C: ChainClient,
    F: EndpointFailover<Session = C::Session>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("endpoint", &self.session.endpoint())
            .field("state", &self.state)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
