//! Ties the Sender Planner, Subprocess Runner, Event Decoder, Broadcast Correlator, and
//! Registry Updater into the end-to-end script-execution pipeline.
//!
//! Each component lives in its own crate with its own narrow error type; this crate composes
//! them behind [`error::DeployError`] and provides the glue a caller needs to run one script and
//! fold its output into a registry, without itself owning a CLI, a config loader, or an RPC
//! client — those stay documented-external collaborators.

pub mod chain_cache;
pub mod error;
pub mod log_extract;
pub mod pipeline;
pub mod resolver;
pub mod tracing_init;

pub use chain_cache::ChainIdCache;
pub use error::DeployError;
pub use pipeline::{apply_run, build_invocation, runner_options, ApplyContext, ChainIdSource, RunRequest};
pub use resolver::{ChainIdResolver, ResolverError, StaticChainIdResolver};
pub use tracing_init::init_tracing;
