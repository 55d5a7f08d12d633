//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, RunMode};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the listening port.
pub const ENV_PORT: &str = "PORT";
/// Environment variable selecting the deployment mode.
pub const ENV_MODE: &str = "APP_ENV";
/// Environment variable carrying the session signing secret.
pub const ENV_SESSION_SECRET: &str = "SESSION_SECRET";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file into a configuration without validating it.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// An environment value that could not be applied and was skipped.
///
/// Configuration is resolved before logging is installed, so these are
/// handed back for the caller to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredEnv {
    pub key: &'static str,
    pub value: String,
}

/// Apply environment overrides on top of a configuration.
///
/// `lookup` is `std::env::var(..).ok()` in production and a map in tests.
pub fn apply_env<F>(config: &mut GatewayConfig, lookup: F) -> Vec<IgnoredEnv>
where
    F: Fn(&str) -> Option<String>,
{
    let mut ignored = Vec::new();

    if let Some(port) = lookup(ENV_PORT) {
        match port.trim().parse::<u16>() {
            Ok(port) => config.listener.port = port,
            Err(_) => ignored.push(IgnoredEnv {
                key: ENV_PORT,
                value: port,
            }),
        }
    }

    if let Some(mode) = lookup(ENV_MODE) {
        config.mode = RunMode::from_env_value(&mode);
    }

    if let Some(secret) = lookup(ENV_SESSION_SECRET) {
        if !secret.is_empty() {
            config.session.secret = secret;
        }
    }

    ignored
}

/// Build the effective configuration: optional file, then environment,
/// then validation. Also returns the environment values that were skipped.
pub fn resolve_config<F>(
    path: Option<&Path>,
    lookup: F,
) -> Result<(GatewayConfig, Vec<IgnoredEnv>), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => GatewayConfig::default(),
    };
    let ignored = apply_env(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, ignored))
}
