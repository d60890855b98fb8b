//! Ordered RPC endpoint set

use crate::ChainError;
use std::ops::Index;
use url::Url;

/// Public Magnet RPC nodes, in failover order
pub const MAGNET_RPC_ENDPOINTS: [&str; 4] = [
    "https://node1.magnetchain.xyz",
    "https://node2.magnetchain.xyz",
    "https://node3.magnetchain.xyz",
    "https://node4.magnetchain.xyz",
];

/// Non-empty, ordered list of RPC endpoints traversed round-robin on failover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    urls: Vec<Url>,
}

impl Endpoints {
    /// Create an endpoint set. Fails if `urls` is empty.
    pub fn new(urls: Vec<Url>) -> Result<Self, ChainError> {
        if urls.is_empty() {
            return Err(ChainError::NoEndpoints);
        }
        Ok(Self { urls })
    }

    /// Parse an endpoint set from strings
    pub fn parse<I, S>(urls: I) -> Result<Self, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|url| {
                let url = url.as_ref();
                Url::parse(url).map_err(|err| ChainError::InvalidEndpoint {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(urls)
    }

    /// The public Magnet nodes
    pub fn magnet() -> Result<Self, ChainError> {
        Self::parse(MAGNET_RPC_ENDPOINTS)
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Whether there are no endpoints. Never true for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Endpoint at `index`
    pub fn get(&self, index: usize) -> Option<&Url> {
        self.urls.get(index)
    }

    /// Index following `index`, wrapping after the last endpoint
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.urls.len()
    }

    /// Iterate over endpoints in failover order
    pub fn iter(&self) -> std::slice::Iter<'_, Url> {
        self.urls.iter()
    }
}

impl Index<usize> for Endpoints {
    type Output = Url;

    fn index(&self, index: usize) -> &Self::Output {
        &self.urls[index]
    }
}

impl<'a> IntoIterator for &'a Endpoints {
    type Item = &'a Url;
    type IntoIter = std::slice::Iter<'a, Url>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
