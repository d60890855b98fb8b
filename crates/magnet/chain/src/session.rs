//! Endpoint sessions and failover

use crate::{
    contract::MiningContract::{self, MiningContractInstance},
    ChainError, ChainSession, Endpoints,
};
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_client::RpcClient;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use std::{fmt, future::Future, time::Duration};
use tracing::{info, warn};
use url::Url;

/// Default per-request transport timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One endpoint connection with the signing identity and contract handle
/// bound to it.
///
/// Never mutated after construction; failover produces a new session.
#[derive(Clone)]
pub struct Session {
    endpoint_index: usize,
    endpoint: Url,
    address: Address,
    provider: DynProvider,
    contract: MiningContractInstance<DynProvider>,
}

impl Session {
    /// Bound endpoint URL
    pub const fn url(&self) -> &Url {
        &self.endpoint
    }

    /// Signing provider bound to the endpoint
    pub const fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Mining contract handle bound to the endpoint
    pub const fn contract(&self) -> &MiningContractInstance<DynProvider> {
        &self.contract
    }
}

impl ChainSession for Session {
    fn address(&self) -> Address {
        self.address
    }

    fn endpoint_index(&self) -> usize {
        self.endpoint_index
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint_index", &self.endpoint_index)
            .field("endpoint", &self.endpoint.as_str())
            .field("address", &self.address)
            .field("contract", self.contract.address())
            .finish_non_exhaustive()
    }
}

/// Replaces a session whose endpoint became unreachable
pub trait EndpointFailover: Send + Sync {
    /// Session type produced
    type Session: ChainSession;

    /// Bind the same identity to the next reachable endpoint after the one
    /// `session` uses.
    fn failover(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<Self::Session, ChainError>> + Send;
}

/// Builds sessions over a fixed endpoint list for one signing key
#[derive(Debug, Clone)]
pub struct SessionManager {
    endpoints: Endpoints,
    signer: PrivateKeySigner,
    contract: Address,
    request_timeout: Duration,
    chain_id: Option<u64>,
    probe: bool,
}

impl SessionManager {
    /// Create a session manager. Connections are probed with `eth_chainId`.
    pub const fn new(endpoints: Endpoints, signer: PrivateKeySigner, contract: Address) -> Self {
        Self {
            endpoints,
            signer,
            contract,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chain_id: None,
            probe: true,
        }
    }

    /// Set the transport timeout applied to every request
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject endpoints serving a chain other than `chain_id`
    pub const fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Skip the reachability probe; connection errors surface on first use
    pub const fn lazy(mut self) -> Self {
        self.probe = false;
        self
    }

    /// Configured endpoints
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Account sessions sign for
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Bind the signer and contract to the endpoint at `index`.
    pub async fn connect(&self, index: usize) -> Result<Session, ChainError> {
        let endpoint = self
            .endpoints
            .get(index)
            .cloned()
            .ok_or(ChainError::UnknownEndpoint { index, count: self.endpoints.len() })?;

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|err| ChainError::Connectivity(err.to_string()))?;
        let client = RpcClient::new(Http::with_client(http, endpoint.clone()), false);
        let session = self.bind(index, endpoint, client);

        if self.probe {
            self.probe(session.provider(), session.url()).await?;
        }

        info!(
            target: "magnet::session",
            endpoint = %session.endpoint,
            index,
            address = %session.address,
            "Session established"
        );

        Ok(session)
    }

    /// Wrap `client` in a signing provider and bind the contract to it.
    ///
    /// The nonce is read from the node for every transaction, so a send that
    /// failed before reaching the mempool does not leave a gap.
    fn bind(&self, index: usize, endpoint: Url, client: RpcClient) -> Session {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .with_simple_nonce_management()
            .fetch_chain_id()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .connect_client(client)
            .erased();
        let contract = MiningContract::new(self.contract, provider.clone());

        Session { endpoint_index: index, endpoint, address: self.signer.address(), provider, contract }
    }

    /// Session over a mocked transport answering from `asserter`
    #[cfg(test)]
    pub(crate) fn mocked(&self, asserter: alloy_transport::mock::Asserter) -> Session {
        self.bind(0, self.endpoints[0].clone(), RpcClient::mocked(asserter))
    }

    async fn probe(&self, provider: &DynProvider, endpoint: &Url) -> Result<(), ChainError> {
        let actual = provider
            .get_chain_id()
            .await
            .map_err(|err| ChainError::Connectivity(format!("{endpoint}: {err}")))?;

        match self.chain_id {
            Some(expected) if expected != actual => Err(ChainError::ChainIdMismatch {
                endpoint: endpoint.to_string(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// Move to the next endpoint in round-robin order, skipping endpoints
    /// that fail to connect. After a full lap without success the last error
    /// is returned and the caller keeps its current session.
    pub async fn failover(&self, session: &Session) -> Result<Session, ChainError> {
        let mut index = session.endpoint_index;
        let mut last_error = ChainError::NoEndpoints;

        for _ in 0..self.endpoints.len() {
            index = self.endpoints.next_index(index);
            warn!(
                target: "magnet::session",
                from = %session.endpoint,
                to = %self.endpoints[index],
                "Switching RPC endpoint"
            );
            match self.connect(index).await {
                Ok(next) => return Ok(next),
                Err(err) => {
                    warn!(
                        target: "magnet::session",
                        endpoint = %self.endpoints[index],
                        error = %err,
                        "Endpoint unavailable"
                    );
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}

impl EndpointFailover for SessionManager {
    type Session = Session;

    async fn failover(&self, session: &Session) -> Result<Session, ChainError> {
        Self::failover(self, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U64;
    use alloy_transport::mock::Asserter;
    use assert_matches::assert_matches;

    // well-known development key
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn manager(urls: &[&str]) -> SessionManager {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        SessionManager::new(Endpoints::parse(urls).unwrap(), signer, Address::ZERO)
    }

    #[tokio::test]
    async fn test_failover_rotation() {
        let manager = manager(&[
            "http://127.0.0.1:1/",
            "http://127.0.0.1:2/",
            "http://127.0.0.1:3/",
            "http://127.0.0.1:4/",
        ])
        .lazy();

        let mut session = manager.connect(0).await.unwrap();
        let mut visited = Vec::new();
        for _ in 0..4 {
            session = manager.failover(&session).await.unwrap();
            visited.push(session.endpoint_index());
        }

        assert_eq!(visited, vec![1, 2, 3, 0]);
        assert_eq!(session.url().as_str(), "http://127.0.0.1:1/");
    }

    #[tokio::test]
    async fn test_failover_keeps_identity() {
        let manager = manager(&["http://127.0.0.1:1/", "http://127.0.0.1:2/"]).lazy();
        let first = manager.connect(0).await.unwrap();
        let second = manager.failover(&first).await.unwrap();

        assert_eq!(first.address(), second.address());
        assert_eq!(second.address(), manager.address());
        assert_eq!(first.endpoint_index(), 0);
        assert_eq!(second.endpoint(), "http://127.0.0.1:2/");
    }

    #[tokio::test]
    async fn test_connect_unknown_index() {
        let manager = manager(&["http://127.0.0.1:1/"]).lazy();
        assert_matches!(
            manager.connect(3).await,
            Err(ChainError::UnknownEndpoint { index: 3, count: 1 })
        );
    }

    #[tokio::test]
    async fn test_chain_id_mismatch() {
        let asserter = Asserter::new();
        let manager = manager(&["http://127.0.0.1:1/"]).with_chain_id(114514);
        let session = manager.mocked(asserter.clone());

        asserter.push_success(&U64::from(1));
        assert_matches!(
            manager.probe(session.provider(), session.url()).await,
            Err(ChainError::ChainIdMismatch { expected: 114514, actual: 1, .. })
        );

        asserter.push_success(&U64::from(114514));
        manager.probe(session.provider(), session.url()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_probe() {
        let manager = manager(&["http://127.0.0.1:1/", "http://127.0.0.1:2/"])
            .with_request_timeout(Duration::from_secs(2));

        assert_matches!(manager.connect(0).await, Err(ChainError::Connectivity(_)));

        let lazy = manager.clone().lazy().connect(0).await.unwrap();
        assert_matches!(manager.failover(&lazy).await, Err(ChainError::Connectivity(_)));
    }
}
