//! Ambient logging setup: `tracing` fmt subscriber driven by CLI verbosity
//! and the config file's default level.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Install the global `tracing` subscriber. Safe to call once at startup;
/// a second call is a no-op with a warning from `tracing-subscriber`
/// itself.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
