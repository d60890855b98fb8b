//! Mining contract and ledger calls

use crate::{
    contract::MiningContract::MiningReward, ChainError, ChainSession, MiningTask, Session,
    TxReceipt,
};
use alloy_contract::SolCallBuilder;
use alloy_primitives::U256;
use alloy_network::Ethereum;
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider};
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_sol_types::SolCall;
use std::{future::Future, time::Duration};
use tracing::{debug, info};

/// Default gas limit, as a percentage of the node's estimate
pub const DEFAULT_GAS_MARGIN_PERCENT: u64 = 110;

/// Default time to wait for a transaction to be mined
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Operations the miner performs against the ledger and the mining contract.
///
/// Every call takes the session explicitly so a replaced session can never be
/// used by accident.
pub trait ChainClient: Send + Sync {
    /// Session type calls run against
    type Session: ChainSession;

    /// Native balance of the session's account
    fn balance(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Funds held by the contract for rewards
    fn pool_balance(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Reward paid per accepted solution
    fn free_reward(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Chain id reported by the endpoint
    fn chain_id(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Send `requestMiningTask()` and wait for it to be mined
    fn request_task(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Read the caller's current task
    fn fetch_task(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<MiningTask, ChainError>> + Send;

    /// Send `submitMiningResult(solution)` and wait for it to be mined
    fn submit_solution(
        &self,
        session: &Self::Session,
        solution: U256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;
}

/// [`ChainClient`] over JSON-RPC sessions
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    gas_margin_percent: u64,
    confirmation_timeout: Duration,
}

impl Default for RpcChainClient {
    fn default() -> Self {
        Self {
            gas_margin_percent: DEFAULT_GAS_MARGIN_PERCENT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

impl RpcChainClient {
    /// Create a client with default gas margin and confirmation timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gas limit as a percentage of the estimate
    pub const fn with_gas_margin_percent(mut self, percent: u64) -> Self {
        self.gas_margin_percent = percent;
        self
    }

    /// Set how long to wait for a transaction to be mined
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Gas limit to send for a given estimate
    pub fn gas_limit(&self, estimate: u64) -> Result<u64, ChainError> {
        estimate
            .checked_mul(self.gas_margin_percent)
            .map(|gas| gas / 100)
            .ok_or_else(|| {
                ChainError::NumericFault(format!(
                    "gas estimate {estimate} overflows with {}% margin",
                    self.gas_margin_percent
                ))
            })
    }

    /// Estimate, price, send and confirm a contract call.
    async fn transact<C>(
        &self,
        session: &Session,
        call: SolCallBuilder<&DynProvider, C>,
        action: &'static str,
    ) -> Result<TxReceipt, ChainError>
    where
        C: SolCall + Send + Sync,
    {
        let pending = self.send(session, call, action).await?;
        let receipt =
            pending.with_timeout(Some(self.confirmation_timeout)).get_receipt().await?;
        confirmed(action, receipt)
    }

    /// Estimate and price a contract call, then broadcast it.
    async fn send<C>(
        &self,
        session: &Session,
        call: SolCallBuilder<&DynProvider, C>,
        action: &'static str,
    ) -> Result<PendingTransactionBuilder<Ethereum>, ChainError>
    where
        C: SolCall + Send + Sync,
    {
        let estimate = call.estimate_gas().await.map_err(ChainError::gas_estimation)?;
        let gas_limit = self.gas_limit(estimate)?;
        let gas_price = session.provider().get_gas_price().await?;

        let pending = call.gas(gas_limit).gas_price(gas_price).send().await?;
        debug!(
            target: "magnet::chain",
            action,
            tx_hash = %pending.tx_hash(),
            gas_limit,
            gas_price,
            "Transaction sent"
        );
        Ok(pending)
    }
}

/// Turn a mined receipt into a [`TxReceipt`], rejecting reverted transactions.
fn confirmed(action: &str, receipt: TransactionReceipt) -> Result<TxReceipt, ChainError> {
    if !receipt.status() {
        return Err(ChainError::TransactionRejected {
            tx_hash: Some(receipt.transaction_hash),
            reason: format!("{action} reverted on-chain"),
        });
    }

    let reward = receipt
        .inner
        .logs()
        .iter()
        .find_map(|log| log.log_decode::<MiningReward>().ok())
        .map(|event| event.inner.data.reward);

    info!(
        target: "magnet::chain",
        action,
        tx_hash = %receipt.transaction_hash,
        block = ?receipt.block_number,
        gas_used = receipt.gas_used,
        "Transaction confirmed"
    );

    Ok(TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
        reward,
    })
}

impl ChainClient for RpcChainClient {
    type Session = Session;

    async fn balance(&self, session: &Session) -> Result<U256, ChainError> {
        Ok(session.provider().get_balance(session.address()).await?)
    }

    async fn pool_balance(&self, session: &Session) -> Result<U256, ChainError> {
        Ok(session.contract().getContractBalance().call().await?)
    }

    async fn free_reward(&self, session: &Session) -> Result<U256, ChainError> {
        Ok(session.contract().FREE_REWARD().call().await?)
    }

    async fn chain_id(&self, session: &Session) -> Result<u64, ChainError> {
        Ok(session.provider().get_chain_id().await?)
    }

    async fn request_task(&self, session: &Session) -> Result<TxReceipt, ChainError> {
        self.transact(session, session.contract().requestMiningTask(), "requestMiningTask").await
    }

    async fn fetch_task(&self, session: &Session) -> Result<MiningTask, ChainError> {
        let task = session.contract().getMyTask().call().await?;
        if task.active && task.difficulty.is_zero() {
            return Err(ChainError::NumericFault("active task reports zero difficulty".into()));
        }
        Ok(MiningTask { nonce: task.nonce, difficulty: task.difficulty, active: task.active })
    }

    async fn submit_solution(
        &self,
        session: &Session,
        solution: U256,
    ) -> Result<TxReceipt, ChainError> {
        self.transact(
            session,
            session.contract().submitMiningResult(solution),
            "submitMiningResult",
        )
        .await
    }
}
