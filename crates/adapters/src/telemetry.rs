//! Tracing bootstrap
//!
//! Installs the global tracing subscriber. Call once from the embedding
//! process; repeated calls are no-ops so tests can share it safely.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with an env-filter.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies
/// (e.g. `"rollout=info"`).
pub fn init_telemetry(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
