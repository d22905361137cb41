use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use deploy_broadcast::Correlator;
use deploy_events::Event;
use serde_json::json;
use thiserror::Error;

use crate::model::{
    ChainInfo, ChainInfoStatus, DeployType, Deployment, Metadata, NetworkEntry, ProxyType,
    Registry, VerificationStatus,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to access registry file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to (de)serialize registry JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no deployment at chain {chain_id} address {address} to mutate")]
    NotFound { chain_id: u64, address: Address },
}

/// One engine run's decoded event stream plus the context needed to fold it into a registry.
pub struct UpdateInput<'a> {
    pub chain_id: u64,
    pub network_name: Option<String>,
    pub namespace: String,
    /// `(emitting address, decoded event)` pairs, in emission order.
    pub events: &'a [(Address, Event)],
    pub correlator: &'a Correlator,
    pub broadcast_file_ref: String,
    pub timestamp: u64,
    /// `"path:Name"` artifact identifiers known to be Solidity libraries.
    pub library_artifacts: &'a BTreeMap<String, bool>,
}

fn lowercase_key(address: Address) -> String {
    format!("{address:#x}")
}

#[derive(Debug, Default)]
struct ProxyAccum {
    implementation: Option<Address>,
    beacon: Option<Address>,
    admin: Option<Address>,
    saw_upgraded: bool,
    saw_beacon_upgraded: bool,
    transparent: bool,
}

fn collect_proxy_info(events: &[(Address, Event)]) -> BTreeMap<Address, ProxyAccum> {
    let mut by_address: BTreeMap<Address, ProxyAccum> = BTreeMap::new();
    for (address, event) in events {
        let accum = by_address.entry(*address).or_default();
        match event {
            Event::Upgraded(e) => {
                accum.implementation = Some(e.implementation);
                accum.saw_upgraded = true;
            }
            Event::BeaconUpgraded(e) => {
                accum.beacon = Some(e.beacon);
                accum.saw_beacon_upgraded = true;
            }
            Event::AdminChanged(e) => {
                if !e.previousAdmin.is_zero() {
                    accum.admin = Some(e.newAdmin);
                    if !accum.saw_upgraded {
                        accum.transparent = true;
                    }
                }
            }
            _ => {}
        }
    }
    by_address
}

#[derive(Debug, Clone)]
struct SafeQueueEntry {
    safe: Address,
    safe_tx_hash: B256,
    status: u8,
}

/// Below this threshold the Safe multisig is still gathering confirmations; at or above it the
/// transaction has enough signatures to be queued for execution. `2` is the only status value a
/// worked example pins down, so it's the boundary.
const SAFE_STATUS_QUEUED_THRESHOLD: u8 = 2;

fn collect_safe_queue(events: &[(Address, Event)]) -> BTreeMap<B256, SafeQueueEntry> {
    let mut queued = BTreeMap::new();
    for (_, event) in events {
        if let Event::SafeTransactionQueued(e) = event {
            for row in &e.transactions {
                queued.insert(
                    row.transactionId,
                    SafeQueueEntry { safe: e.safe, safe_tx_hash: row.safeTxHash, status: row.status },
                );
            }
        }
    }
    queued
}

fn proxy_type_and_extra(accum: &ProxyAccum) -> (ProxyType, BTreeMap<String, serde_json::Value>) {
    let proxy_type =
        if accum.saw_beacon_upgraded { ProxyType::Beacon } else if accum.transparent { ProxyType::Transparent } else { ProxyType::UUPS };

    let mut extra = BTreeMap::new();
    extra.insert("implementation".to_string(), json!(accum.implementation.unwrap_or(Address::ZERO)));
    extra.insert("proxy_type".to_string(), json!(proxy_type));
    match proxy_type {
        ProxyType::Beacon => {
            extra.insert("beacon".to_string(), json!(accum.beacon.unwrap_or(Address::ZERO)));
        }
        ProxyType::Transparent => {
            extra.insert("admin".to_string(), json!(accum.admin.unwrap_or(Address::ZERO)));
        }
        ProxyType::UUPS => {}
    }
    (proxy_type, extra)
}

/// Folds one engine run's events into `registry`, applying the full-replacement, idempotent
/// semantics documented on [`Registry`]. Does not persist; call [`Registry::save`] afterward.
pub fn apply(registry: &mut Registry, input: &UpdateInput<'_>) -> Result<(), RegistryError> {
    let proxy_info = collect_proxy_info(input.events);
    let safe_queue = collect_safe_queue(input.events);

    for (_, event) in input.events {
        let Event::ContractDeployed(e) = event else { continue };

        let artifact = e.deployment.artifact.clone();
        let contract_name = artifact.rsplit(':').next().unwrap_or(&artifact).to_string();
        let is_library = input.library_artifacts.get(&artifact).copied().unwrap_or(false);

        let (deploy_type, extra) = if is_library {
            (DeployType::Library, BTreeMap::new())
        } else if let Some(accum) = proxy_info.get(&e.location) {
            let (_, extra) = proxy_type_and_extra(accum);
            (DeployType::Proxy, extra)
        } else {
            (DeployType::Singleton, BTreeMap::new())
        };

        let correlation = input.correlator.correlate(e.location, e.deployer);
        let queued = safe_queue.get(&e.transactionId);

        let chain_info = ChainInfo {
            tx_hash: correlation.tx_hash,
            block_number: correlation.block_number,
            broadcast_file_ref: input.broadcast_file_ref.clone(),
            timestamp: input.timestamp,
            status: match queued {
                Some(q) if q.status >= SAFE_STATUS_QUEUED_THRESHOLD => ChainInfoStatus::Queued,
                Some(_) => ChainInfoStatus::PendingSafe,
                None => ChainInfoStatus::Executed,
            },
            deployer: e.deployer,
            safe_address: queued.map(|q| q.safe),
            safe_tx_hash: queued.map(|q| q.safe_tx_hash),
        };

        let deployment = Deployment {
            address: e.location,
            contract_name: contract_name.clone(),
            namespace: input.namespace.clone(),
            deploy_type,
            salt: format!("{:#x}", e.deployment.salt),
            init_code_hash: format!("{:#x}", e.deployment.initCodeHash),
            constructor_args: e.deployment.constructorArgs.clone(),
            label: e.deployment.label.clone(),
            tags: Vec::new(),
            verification: VerificationStatus::default(),
            chain_info,
            metadata: Metadata { contract_path: artifact.clone(), ..Metadata::default() },
            extra,
        };

        if deploy_type == DeployType::Library {
            let key = format!("{}-{}", input.chain_id, contract_name);
            registry.libraries.insert(key, deployment);
        } else {
            let chain_key = input.chain_id.to_string();
            let entry = registry.networks.entry(chain_key.clone()).or_insert_with(|| NetworkEntry {
                name: input.network_name.clone().unwrap_or_else(|| format!("chain-{}", input.chain_id)),
                deployments: BTreeMap::new(),
            });
            entry.deployments.insert(lowercase_key(e.location), deployment);
        }
    }

    Ok(())
}

/// Removes entries whose salt and init-code-hash are both unspecified and whose broadcast file
/// is missing or empty on disk, then drops any network left with no deployments. Structural
/// only: no chain-specific special-casing.
pub fn clean_invalid_entries(registry: &mut Registry, broadcast_file_present: impl Fn(&str) -> bool) {
    for network in registry.networks.values_mut() {
        network.deployments.retain(|_, deployment| {
            !(deployment.has_unspecified_identity() && !broadcast_file_present(&deployment.chain_info.broadcast_file_ref))
        });
    }
    registry.networks.retain(|_, network| !network.deployments.is_empty());

    registry.libraries.retain(|_, deployment| {
        !(deployment.has_unspecified_identity() && !broadcast_file_present(&deployment.chain_info.broadcast_file_ref))
    });
}

impl Registry {
    fn find_deployment_mut(&mut self, chain_id: u64, address: Address) -> Option<&mut Deployment> {
        self.networks.get_mut(&chain_id.to_string())?.deployments.get_mut(&lowercase_key(address))
    }

    /// Overwrites the tag list on an existing deployment.
    pub fn set_tags(&mut self, chain_id: u64, address: Address, tags: Vec<String>) -> Result<(), RegistryError> {
        let deployment =
            self.find_deployment_mut(chain_id, address).ok_or(RegistryError::NotFound { chain_id, address })?;
        deployment.tags = tags;
        Ok(())
    }

    /// Overwrites the verification status on an existing deployment.
    pub fn set_verification_status(
        &mut self,
        chain_id: u64,
        address: Address,
        status: String,
    ) -> Result<(), RegistryError> {
        let deployment =
            self.find_deployment_mut(chain_id, address).ok_or(RegistryError::NotFound { chain_id, address })?;
        deployment.verification = VerificationStatus { status };
        Ok(())
    }
}
