//! Logging setup for the certificate tool.
//!
//! Configures `tracing-subscriber` with environment-based filtering
//! (`RUST_LOG`, default `info`) and a format switch (`LOG_FORMAT`): pretty
//! output for interactive use, JSON for log aggregation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format for interactive runs.
    Pretty,
    /// JSON format for log aggregation.
    Json,
}

impl LogFormat {
    /// Determines the log format from the `LOG_FORMAT` environment variable
    /// (`json` selects JSON; anything else selects pretty).
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initializes the global subscriber. Call once at startup.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match LogFormat::from_env() {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
