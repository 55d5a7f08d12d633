//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Refuse the development session secret in production
//! - Validate value ranges (0 < ttl <= one year, connection limit > 0)
//! - Validate mount paths and upstream addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;

use crate::config::schema::{GatewayConfig, StaticMount, DEVELOPMENT_SECRET, MAX_SESSION_TTL_SECS};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("production mode requires SESSION_SECRET to be changed from the development default")]
    DevelopmentSecretInProduction,

    #[error("session secret must not be empty")]
    EmptySecret,

    #[error("session ttl must be greater than zero")]
    ZeroSessionTtl,

    #[error("session ttl of {0}s exceeds the {MAX_SESSION_TTL_SECS}s maximum")]
    SessionTtlTooLong(u64),

    #[error("session cookie name must not be empty")]
    EmptyCookieName,

    #[error("listener max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("{field} must start and end with '/': {value:?}")]
    BadPrefix { field: &'static str, value: String },

    #[error("datagram mount_suffix must start with '/': {0:?}")]
    BadSuffix(String),

    #[error("{field} is not a valid host:port address: {value:?}")]
    BadUpstream { field: &'static str, value: String },
}

/// Check a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.session.secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    } else if config.mode.is_production() && config.session.secret == DEVELOPMENT_SECRET {
        errors.push(ValidationError::DevelopmentSecretInProduction);
    }
    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::ZeroSessionTtl);
    } else if config.session.ttl_secs > MAX_SESSION_TTL_SECS {
        errors.push(ValidationError::SessionTtlTooLong(config.session.ttl_secs));
    }
    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if !is_mount_prefix(&config.backend.mount_prefix) {
        errors.push(ValidationError::BadPrefix {
            field: "backend.mount_prefix",
            value: config.backend.mount_prefix.clone(),
        });
    }
    if !config.datagram.mount_suffix.starts_with('/') {
        errors.push(ValidationError::BadSuffix(config.datagram.mount_suffix.clone()));
    }

    check_mounts(&config.statics.mounts, "statics.mounts", &mut errors);
    check_mounts(&config.backend.client_assets, "backend.client_assets", &mut errors);

    if let Some(upstream) = &config.backend.upstream {
        check_upstream(upstream, "backend.upstream", &mut errors);
    }
    if let Some(upstream) = &config.datagram.upstream {
        check_upstream(upstream, "datagram.upstream", &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_mount_prefix(prefix: &str) -> bool {
    prefix.starts_with('/') && prefix.ends_with('/')
}

fn check_mounts(mounts: &[StaticMount], field: &'static str, errors: &mut Vec<ValidationError>) {
    for mount in mounts {
        if !is_mount_prefix(&mount.prefix) {
            errors.push(ValidationError::BadPrefix {
                field,
                value: mount.prefix.clone(),
            });
        }
    }
}

fn check_upstream(value: &str, field: &'static str, errors: &mut Vec<ValidationError>) {
    let valid = value
        .parse::<Authority>()
        .map(|authority| authority.port_u16().is_some())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::BadUpstream {
            field,
            value: value.to_string(),
        });
    }
}
