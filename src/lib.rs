pub mod analytics;
pub mod api;
pub mod config;
pub mod models;
pub mod period;
pub mod report;
pub mod storage;

use tracing_subscriber::EnvFilter;

/// Install the `tracing` subscriber shared by both binaries.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
