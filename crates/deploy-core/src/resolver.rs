use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("chain id lookup failed for {rpc_url}: {message}")]
    Lookup { rpc_url: String, message: String },
}

/// Resolves an RPC URL to a chain id. The real implementation (an HTTP JSON-RPC `eth_chainId`
/// call) lives outside this crate; this trait is the seam the Registry Updater and Subprocess
/// Runner depend on instead of owning an RPC client themselves.
#[async_trait::async_trait]
pub trait ChainIdResolver: Send + Sync {
    async fn chain_id(&self, rpc_url: &str) -> Result<u64, ResolverError>;
}

/// An in-memory resolver keyed by RPC URL, for tests and for callers who already know their
/// chain ids (e.g. from namespace config) and don't want a network round trip.
#[derive(Debug, Clone, Default)]
pub struct StaticChainIdResolver {
    known: HashMap<String, u64>,
}

impl StaticChainIdResolver {
    pub fn new(known: HashMap<String, u64>) -> Self {
        Self { known }
    }

    pub fn with(mut self, rpc_url: impl Into<String>, chain_id: u64) -> Self {
        self.known.insert(rpc_url.into(), chain_id);
        self
    }
}

#[async_trait::async_trait]
impl ChainIdResolver for StaticChainIdResolver {
    async fn chain_id(&self, rpc_url: &str) -> Result<u64, ResolverError> {
        self.known.get(rpc_url).copied().ok_or_else(|| ResolverError::Lookup {
            rpc_url: rpc_url.to_string(),
            message: "no chain id configured for this RPC URL".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_configured_chain_id() {
        let resolver = StaticChainIdResolver::default().with("http://localhost:8545", 31337);
        assert_eq!(resolver.chain_id("http://localhost:8545").await.unwrap(), 31337);
    }

    #[tokio::test]
    async fn unknown_url_is_an_error() {
        let resolver = StaticChainIdResolver::default();
        assert!(resolver.chain_id("http://example.invalid").await.is_err());
    }
}
