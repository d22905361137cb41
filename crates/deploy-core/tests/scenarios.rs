//! End-to-end scenarios over synthetic engine output, no live `forge` involved: a fabricated
//! `ScriptResult` stands in for what the Subprocess Runner would have produced, and each test
//! drives the rest of the pipeline (Event Decoder, Broadcast Correlator, Registry Updater)
//! exactly as `apply_run` would for a real run.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Address, B256};
use alloy_sol_types::{SolEvent, SolValue};
use deploy_config::{Account, Namespace, NamespaceRoles, Resolver};
use deploy_core::{apply_run, build_invocation, ApplyContext, ChainIdSource, RunRequest, StaticChainIdResolver};
use deploy_engine::ScriptResult;
use deploy_events::{ContractDeployed, ContractDeployment, SafeTransactionQueued, Upgraded};
use deploy_registry::{ChainInfoStatus, DeployType, ProxyType, Registry};

fn script_result_with_logs(raw_logs: serde_json::Value) -> ScriptResult {
    ScriptResult {
        exit_success: true,
        script_outputs: vec![serde_json::json!({"raw_logs": raw_logs})],
        ..Default::default()
    }
}

fn raw_log(address: Address, topics: &[B256], data: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "address": address.to_string(),
        "topics": topics.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        "data": alloy_primitives::Bytes::from(data.to_vec()).to_string(),
    })
}

fn empty_broadcast_file() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), br#"{"transactions":[],"receipts":[]}"#).unwrap();
    file
}

fn write_broadcast(transactions: serde_json::Value, receipts: serde_json::Value) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    let doc = serde_json::json!({"transactions": transactions, "receipts": receipts});
    std::fs::write(file.path(), serde_json::to_vec(&doc).unwrap()).unwrap();
    file
}

fn deployment(
    deployer: Address,
    location: Address,
    transaction_id: B256,
    artifact: &str,
    salt: B256,
    init_code_hash: B256,
) -> (B256, serde_json::Value) {
    let deployment = ContractDeployment {
        artifact: artifact.to_string(),
        label: String::new(),
        entropy: String::new(),
        salt,
        bytecodeHash: B256::ZERO,
        initCodeHash: init_code_hash,
        constructorArgs: Default::default(),
        createStrategy: "create2".to_string(),
    };
    let log = raw_log(
        location,
        &[ContractDeployed::SIGNATURE_HASH, deployer.into_word(), location.into_word(), transaction_id],
        &deployment.abi_encode(),
    );
    (transaction_id, log)
}

#[tokio::test]
async fn simple_deploy_no_safe() {
    let deployer = Address::repeat_byte(0xAA);
    let location = Address::repeat_byte(0xCA);
    let tx_id = B256::repeat_byte(0x01);
    let salt = B256::repeat_byte(0x02);
    let init_code_hash = B256::repeat_byte(0x03);
    let (_, log) = deployment(deployer, location, tx_id, "src/Counter.sol:Counter", salt, init_code_hash);
    let result = script_result_with_logs(serde_json::json!([log]));

    let broadcast = write_broadcast(
        serde_json::json!([{
            "hash": B256::repeat_byte(0x11).to_string(),
            "transaction": {"from": deployer.to_string(), "to": null},
            "contractAddress": location.to_string(),
        }]),
        serde_json::json!([{"blockNumber": "0x10", "contractAddress": null}]),
    );

    let mut registry = Registry::default();
    let resolver = StaticChainIdResolver::default();
    apply_run(
        &mut registry,
        &result,
        ApplyContext {
            namespace: "default".to_string(),
            chain_id_or_rpc_url: ChainIdSource::Known(1),
            network_name: None,
            broadcast_artifact_path: broadcast.path(),
            broadcast_file_ref: broadcast.path().display().to_string(),
            library_artifacts: &BTreeMap::new(),
        },
        &resolver,
    )
    .await
    .unwrap();

    let entry = registry.networks.get("1").unwrap();
    let deployment = entry.deployments.get(&format!("{location:#x}")).unwrap();
    assert_eq!(deployment.deploy_type, DeployType::Singleton);
    assert_eq!(deployment.chain_info.tx_hash, Some(B256::repeat_byte(0x11)));
    assert_eq!(deployment.chain_info.block_number, Some(16));
    assert_eq!(deployment.chain_info.status, ChainInfoStatus::Executed);
    assert_eq!(deployment.namespace, "default");
    assert_eq!(deployment.metadata.contract_path, "src/Counter.sol:Counter");
}

#[tokio::test]
async fn proxy_upgrade_pair() {
    let deployer = Address::repeat_byte(0xAA);
    let implementation = Address::repeat_byte(0x10);
    let proxy = Address::repeat_byte(0x20);
    let tx_id = B256::repeat_byte(0x02);

    let (_, impl_log) =
        deployment(deployer, implementation, tx_id, "src/Impl.sol:Impl", B256::ZERO, B256::ZERO);
    let (_, proxy_log) = deployment(deployer, proxy, tx_id, "src/Proxy.sol:Proxy", B256::ZERO, B256::ZERO);
    let upgraded_log = raw_log(proxy, &[Upgraded::SIGNATURE_HASH, implementation.into_word()], &[]);

    let result = script_result_with_logs(serde_json::json!([impl_log, proxy_log, upgraded_log]));
    let broadcast = empty_broadcast_file();
    let mut registry = Registry::default();
    let resolver = StaticChainIdResolver::default();

    apply_run(
        &mut registry,
        &result,
        ApplyContext {
            namespace: "default".to_string(),
            chain_id_or_rpc_url: ChainIdSource::Known(1),
            network_name: None,
            broadcast_artifact_path: broadcast.path(),
            broadcast_file_ref: broadcast.path().display().to_string(),
            library_artifacts: &BTreeMap::new(),
        },
        &resolver,
    )
    .await
    .unwrap();

    let entry = registry.networks.get("1").unwrap();
    let proxy_entry = entry.deployments.get(&format!("{proxy:#x}")).unwrap();
    assert_eq!(proxy_entry.deploy_type, DeployType::Proxy);
    assert_eq!(
        proxy_entry.extra.get("implementation").unwrap(),
        &serde_json::json!(implementation)
    );
    assert_eq!(proxy_entry.extra.get("proxy_type").unwrap(), &serde_json::json!(ProxyType::UUPS));

    let impl_entry = entry.deployments.get(&format!("{implementation:#x}")).unwrap();
    assert_eq!(impl_entry.deploy_type, DeployType::Singleton);
}

#[tokio::test]
async fn safe_queued_deploy() {
    let deployer = Address::repeat_byte(0xAA);
    let location = Address::repeat_byte(0xCA);
    let tx_id = B256::repeat_byte(0x03);
    let safe = Address::repeat_byte(0x50);
    let proposer = Address::repeat_byte(0x51);
    let safe_tx_hash = B256::repeat_byte(0x60);

    let queued = SafeTransactionQueued {
        safeTxHash: safe_tx_hash,
        safe,
        proposer,
        transactions: vec![deploy_events::RichTransaction {
            tx: deploy_events::SimpleCall { label: String::new(), to: location, data: Default::default(), value: Default::default() },
            transactionId: tx_id,
            safeTxHash: safe_tx_hash,
            status: 2,
            signature: Default::default(),
            extra: Default::default(),
        }],
    };
    let queued_log = raw_log(
        safe,
        &[SafeTransactionQueued::SIGNATURE_HASH, safe_tx_hash, safe.into_word(), proposer.into_word()],
        &queued.transactions.abi_encode(),
    );
    let (_, deployed_log) = deployment(deployer, location, tx_id, "src/Counter.sol:Counter", B256::ZERO, B256::ZERO);

    let result = script_result_with_logs(serde_json::json!([queued_log, deployed_log]));
    let broadcast = empty_broadcast_file();
    let mut registry = Registry::default();
    let resolver = StaticChainIdResolver::default();

    apply_run(
        &mut registry,
        &result,
        ApplyContext {
            namespace: "default".to_string(),
            chain_id_or_rpc_url: ChainIdSource::Known(1),
            network_name: None,
            broadcast_artifact_path: broadcast.path(),
            broadcast_file_ref: broadcast.path().display().to_string(),
            library_artifacts: &BTreeMap::new(),
        },
        &resolver,
    )
    .await
    .unwrap();

    let entry = registry.networks.get("1").unwrap();
    let deployment = entry.deployments.get(&format!("{location:#x}")).unwrap();
    assert_eq!(deployment.chain_info.status, ChainInfoStatus::Queued);
    assert_eq!(deployment.chain_info.safe_address, Some(safe));
    assert_eq!(deployment.chain_info.safe_tx_hash, Some(safe_tx_hash));
    assert_eq!(deployment.chain_info.tx_hash, None);
}

#[tokio::test]
async fn createx_factory_correlation() {
    let deployer = Address::repeat_byte(0x0D);
    let location = Address::repeat_byte(0xDE);
    let tx_id = B256::repeat_byte(0x04);
    let (_, log) = deployment(deployer, location, tx_id, "src/Counter.sol:Counter", B256::ZERO, B256::ZERO);
    let result = script_result_with_logs(serde_json::json!([log]));

    let broadcast = write_broadcast(
        serde_json::json!([{
            "hash": B256::repeat_byte(0x22).to_string(),
            "transaction": {"from": deployer.to_string(), "to": deploy_broadcast::CREATEX_FACTORY.to_string()},
            "contractAddress": null,
        }]),
        serde_json::json!([{"blockNumber": "0x11", "contractAddress": null}]),
    );

    let mut registry = Registry::default();
    let resolver = StaticChainIdResolver::default();
    apply_run(
        &mut registry,
        &result,
        ApplyContext {
            namespace: "default".to_string(),
            chain_id_or_rpc_url: ChainIdSource::Known(1),
            network_name: None,
            broadcast_artifact_path: broadcast.path(),
            broadcast_file_ref: broadcast.path().display().to_string(),
            library_artifacts: &BTreeMap::new(),
        },
        &resolver,
    )
    .await
    .unwrap();

    let entry = registry.networks.get("1").unwrap();
    let deployment = entry.deployments.get(&format!("{location:#x}")).unwrap();
    assert_eq!(deployment.chain_info.tx_hash, Some(B256::repeat_byte(0x22)));
    assert_eq!(deployment.chain_info.block_number, Some(17));
}

#[tokio::test]
async fn engine_failure_leaves_registry_untouched_and_carries_text_lines() {
    let result = ScriptResult {
        exit_success: false,
        text_lines: vec!["Error: script reverted".to_string(), "forge exited with code 1".to_string()],
        ..Default::default()
    };

    let mut registry = Registry::default();
    let resolver = StaticChainIdResolver::default();
    let broadcast = empty_broadcast_file();
    let err = apply_run(
        &mut registry,
        &result,
        ApplyContext {
            namespace: "default".to_string(),
            chain_id_or_rpc_url: ChainIdSource::Known(1),
            network_name: None,
            broadcast_artifact_path: broadcast.path(),
            broadcast_file_ref: broadcast.path().display().to_string(),
            library_artifacts: &BTreeMap::new(),
        },
        &resolver,
    )
    .await
    .unwrap_err();

    match err {
        deploy_core::DeployError::EngineFailure { text_lines } => {
            assert_eq!(text_lines, vec!["Error: script reverted".to_string(), "forge exited with code 1".to_string()]);
        }
        other => panic!("expected EngineFailure, got {other:?}"),
    }
    assert!(registry.networks.is_empty());
}

#[test]
fn hw_policy_conflict_rejects_before_spawn() {
    let mut accounts = HashMap::new();
    accounts.insert(
        "admin-ledger".to_string(),
        Account::Ledger { address: Address::repeat_byte(1), derivation_path: "m/44'/60'/0'/0/0".to_string() },
    );
    accounts.insert(
        "deployer-trezor".to_string(),
        Account::Trezor { address: Address::repeat_byte(2), derivation_path: "m/44'/60'/0'/0/1".to_string() },
    );

    let mut roles = BTreeMap::new();
    roles.insert("admin".to_string(), "admin-ledger".to_string());
    roles.insert("deployer".to_string(), "deployer-trezor".to_string());
    let mut namespaces = HashMap::new();
    namespaces.insert("default".to_string(), NamespaceRoles { roles, profile: None });

    let resolver = Resolver::new(&namespaces, &accounts);
    let artifact_json = serde_json::json!({
        "metadata": {
            "output": {"devdoc": {"methods": {"run()": {"custom:senders": "admin,deployer"}}}}
        }
    });
    let artifact = deploy_artifact::ScriptArtifact::from_slice(&serde_json::to_vec(&artifact_json).unwrap()).unwrap();

    let request = RunRequest {
        script_path: "script/Deploy.s.sol".to_string(),
        namespace: Namespace::new("default"),
        network_name: None,
        rpc_url: None,
        broadcast: false,
        verify: false,
        ffi: false,
        sig: None,
        extra_args: vec![],
        extra_env: BTreeMap::new(),
        foundry_profile: None,
        dryrun: true,
        lib_deployer: None,
        debug_dir: None,
        debug_passthrough: false,
    };

    let err = build_invocation(&request, &artifact, &resolver).unwrap_err();
    assert!(matches!(err, deploy_core::DeployError::Plan(deploy_wallets::PlanError::HwConflict(_))));
}
