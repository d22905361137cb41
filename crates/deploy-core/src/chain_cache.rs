use std::collections::HashMap;
use std::sync::RwLock;

/// The shared-state shape the Broadcast Correlator and Registry Updater agree on for naming a
/// `NetworkEntry`: an explicit, injectable cache rather than a hidden global, matching §9's "no
/// hidden globals" design note. The JSON-RPC lookup that populates it is the documented-external
/// network resolver collaborator; this crate only defines the cache shape and a read/populate API.
#[derive(Debug, Default)]
pub struct ChainIdCache {
    by_rpc_url: RwLock<HashMap<String, u64>>,
}

impl ChainIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rpc_url: &str) -> Option<u64> {
        self.by_rpc_url.read().expect("chain id cache poisoned").get(rpc_url).copied()
    }

    pub fn insert(&self, rpc_url: impl Into<String>, chain_id: u64) {
        self.by_rpc_url.write().expect("chain id cache poisoned").insert(rpc_url.into(), chain_id);
    }
}
