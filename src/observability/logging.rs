//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide subscriber exactly once
//! - Select JSON or pretty output from configuration
//! - Resolve the log level from `RUST_LOG`, falling back to config
//!
//! Code never holds a logger handle. Events go to whatever dispatcher is
//! current: the global default installed here, or a more specific one a
//! caller scopes with `tracing::subscriber::with_default`. Request-scoped
//! fields ride on spans (see `http::request`).

use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &ObservabilityConfig) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_directives(&config.log_level).into());

        let registry = tracing_subscriber::registry().with(filter);
        // Another subscriber may already be installed (tests, embedding apps); keep it.
        let _ = match config.log_format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init(),
            LogFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .try_init(),
        };
    });
}

fn default_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    format!("api_server={level},tower_http={level},sqlx=warn")
}
