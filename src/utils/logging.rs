// src/utils/logging.rs
use tracing_subscriber::EnvFilter;

/// Installs the process-wide tracing subscriber. Call once from the
/// embedding binary; respects `RUST_LOG` and defaults to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
