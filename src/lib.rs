pub mod auth;
pub mod commands;
pub mod config;
pub mod core_state;
pub mod maintenance;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod tabular;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` wins over the configured filter so a single run can be
/// made verbose without touching `scanner.toml`.
pub fn init_tracing(configured_filter: Option<&str>) {
    let fallback = configured_filter.unwrap_or(config::default_log_filter());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // try_init: a second call (tests, embedding) must not panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{} logging initialised", config::APP_NAME, config::APP_VERSION);
}
