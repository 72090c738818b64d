pub mod api;
pub mod artifact_cache;
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod db;
pub mod document_registry;
pub mod models;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}
