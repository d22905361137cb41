//! The persistent, content-addressed registry of deployments across chains and namespaces.
//!
//! `Registry::apply` folds one engine run's decoded event stream and correlated broadcast data
//! into the in-memory document, then `Registry::save` writes it out atomically. Applying the
//! same update twice produces the same document: the write is a full replacement keyed by
//! `(chain_id, lowercase(address))`, never a merge.

mod apply;
mod model;
mod persist;

pub use apply::{apply, clean_invalid_entries, RegistryError, UpdateInput};
pub use model::{
    ChainInfo, ChainInfoStatus, Deployment, DeployType, Metadata, NetworkEntry, ProxyType,
    Registry, VerificationStatus,
};
