use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use deploy_artifact::ScriptArtifact;
use deploy_broadcast::Correlator;
use deploy_config::{Namespace, Resolver};
use deploy_engine::{RunnerOptions, ScriptInvocation, ScriptResult};
use deploy_registry::{apply, Registry, UpdateInput};
use deploy_wallets::{parse_custom_senders, Planner};
use tracing::{info, warn};

use crate::error::DeployError;
use crate::log_extract::events_from_script_outputs;
use crate::resolver::ChainIdResolver;

/// Everything about one script run that isn't derivable from the artifact or namespace config:
/// CLI-level choices and filesystem locations.
pub struct RunRequest {
    pub script_path: String,
    pub namespace: Namespace,
    pub network_name: Option<String>,
    pub rpc_url: Option<String>,
    pub broadcast: bool,
    pub verify: bool,
    pub ffi: bool,
    pub sig: Option<(String, Vec<String>)>,
    pub extra_args: Vec<String>,
    pub extra_env: BTreeMap<String, String>,
    pub foundry_profile: Option<String>,
    pub dryrun: bool,
    pub lib_deployer: Option<String>,
    pub debug_dir: Option<PathBuf>,
    /// Debug, non-JSON mode: the engine runs without `--json` and the runner streams its output
    /// straight to stdout instead of classifying it through the Output Processor.
    pub debug_passthrough: bool,
}

/// Resolves the sender plan and builds the engine invocation for one run. Pure with respect to
/// the filesystem beyond the artifact read already performed by the caller; does not spawn
/// anything, which is what keeps it unit-testable without a live `forge`.
pub fn build_invocation(
    request: &RunRequest,
    artifact: &ScriptArtifact,
    resolver: &Resolver<'_>,
) -> Result<ScriptInvocation, DeployError> {
    let senders = parse_custom_senders(artifact.custom_senders_tag())?;
    let planner = Planner::new(resolver);
    let plan = planner.plan(&request.namespace, &senders)?;

    let encoded =
        deploy_wallets::sender::encode_sender_configs(&plan.configs).map_err(deploy_wallets::PlanError::from)?;
    let mut env = BTreeMap::new();
    env.insert("SENDER_CONFIGS".to_string(), format!("0x{}", hex::encode(encoded)));
    env.insert("NAMESPACE".to_string(), request.namespace.as_str().to_string());
    if let Some(network) = &request.network_name {
        env.insert("NETWORK".to_string(), network.clone());
    }
    if let Some(profile) = &request.foundry_profile {
        env.insert("FOUNDRY_PROFILE".to_string(), profile.clone());
    }
    env.insert("DRYRUN".to_string(), request.dryrun.to_string());
    if let Some(lib_deployer) = &request.lib_deployer {
        env.insert("TREB_LIB_DEPLOYER".to_string(), lib_deployer.clone());
    }
    env.extend(request.extra_env.clone());

    let mut extra_args = request.extra_args.clone();
    for path in &plan.flags.derivation_paths {
        extra_args.push("--hd-path".to_string());
        extra_args.push(path.clone());
    }
    if plan.flags.use_ledger {
        extra_args.push("--ledger".to_string());
    }
    if plan.flags.use_trezor {
        extra_args.push("--trezor".to_string());
    }

    Ok(ScriptInvocation {
        script_path: request.script_path.clone(),
        ffi: request.ffi,
        sig: request.sig.clone(),
        rpc_url: request.rpc_url.clone(),
        broadcast: request.broadcast,
        verify: request.verify,
        json: !request.debug_passthrough,
        extra_args,
        env,
    })
}

/// Derives the runner's invocation mode from `invocation.json` rather than re-deciding it: the
/// engine's own `--json` flag and the runner's choice to classify vs. pass through must agree.
pub fn runner_options(request: &RunRequest, invocation: &ScriptInvocation) -> RunnerOptions {
    RunnerOptions {
        debug_dir: request.debug_dir.clone(),
        deadline: None,
        json_mode: !invocation.is_debug_passthrough(),
    }
}

/// What's needed, beyond a finished [`ScriptResult`], to fold a run into the registry.
pub struct ApplyContext<'a> {
    pub namespace: String,
    pub chain_id_or_rpc_url: ChainIdSource,
    pub network_name: Option<String>,
    pub broadcast_artifact_path: &'a Path,
    pub broadcast_file_ref: String,
    pub library_artifacts: &'a BTreeMap<String, bool>,
}

pub enum ChainIdSource {
    Known(u64),
    ViaRpc(String),
}

/// Decodes the run's event logs, correlates them against the broadcast artifact, and applies
/// the update to `registry`. Does not call [`Registry::save`] — that's the caller's to sequence
/// against any other registry mutation it wants to batch into the same write.
///
/// Per the documented error-handling policy, a non-zero engine exit aborts before touching the
/// registry at all: `EngineFailure` carries no partial effects.
pub async fn apply_run(
    registry: &mut Registry,
    result: &ScriptResult,
    context: ApplyContext<'_>,
    chain_resolver: &dyn ChainIdResolver,
) -> Result<(), DeployError> {
    if !result.exit_success {
        warn!(target: "deploy_core", "engine exited unsuccessfully, registry left unmodified");
        return Err(DeployError::EngineFailure { text_lines: result.text_lines.clone() });
    }

    let chain_id = match context.chain_id_or_rpc_url {
        ChainIdSource::Known(id) => id,
        ChainIdSource::ViaRpc(url) => chain_resolver.chain_id(&url).await?,
    };

    let events = events_from_script_outputs(&result.script_outputs);
    let correlator = Correlator::from_path(context.broadcast_artifact_path)?;
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

    let input = UpdateInput {
        chain_id,
        network_name: context.network_name,
        namespace: context.namespace,
        events: &events,
        correlator: &correlator,
        broadcast_file_ref: context.broadcast_file_ref,
        timestamp,
        library_artifacts: context.library_artifacts,
    };

    apply(registry, &input)?;
    info!(target: "deploy_core", chain_id, deployments = events.len(), "applied run to registry");
    Ok(())
}
