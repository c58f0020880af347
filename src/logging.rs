//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;

/// Build the filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(default_level: &str, format: LogFormat) {
    let filter = env_filter(default_level);
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(false))
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init(),
    }
}
