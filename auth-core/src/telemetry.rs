//! Tracing subscriber setup for embedders and binaries.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global tracing subscriber. `RUST_LOG` overrides `log_level`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
