use thiserror::Error;

use deploy_artifact::ArtifactError;
use deploy_broadcast::BroadcastError;
use deploy_config::ConfigError;
use deploy_engine::RunnerError;
use deploy_events::DecodeError;
use deploy_registry::RegistryError;
use deploy_wallets::PlanError;

use crate::resolver::ResolverError;

/// The crate-wide error aggregate. Each component keeps its own narrower error type for precise
/// unit testing (`PlanError`, `RegistryError`, ...); this composes them with `#[from]` so a
/// caller driving the full pipeline can match on error *kind* without downcasting.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Spawn(#[from] RunnerError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error(transparent)]
    ChainId(#[from] ResolverError),
    #[error("engine exited unsuccessfully; registry left unmodified")]
    EngineFailure {
        /// Raw text lines the engine printed, for the caller to echo once. Populated from
        /// [`deploy_engine::ScriptResult::text_lines`].
        text_lines: Vec<String>,
    },
    #[error(transparent)]
    Apply(#[from] RegistryError),
}
