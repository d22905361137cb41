use tracing_subscriber::prelude::*;

/// Installs a global `tracing` subscriber: `RUST_LOG`-driven filtering over a plain `fmt` layer.
/// The core itself never calls this — a binary embedding the pipeline calls it once at startup,
/// the way `anvil`'s own `init_tracing` does for its node process.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
