//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the output format from the deployment mode
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RunMode;

/// Default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("frontdoor={level},tower_http={level}")
}

/// Install the global subscriber.
pub fn init(mode: RunMode, level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(level).into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match mode {
        RunMode::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        RunMode::Development => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
