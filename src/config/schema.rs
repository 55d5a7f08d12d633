//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Session secret shipped for local development. Refused in production.
pub const DEVELOPMENT_SECRET: &str = "change_in_production!";

/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment mode (development or production).
    pub mode: RunMode,

    /// Listener configuration (bind host, port, connection limit).
    pub listener: ListenerConfig,

    /// Session cookie policy.
    pub session: SessionConfig,

    /// Static asset roots.
    pub statics: StaticConfig,

    /// Generic tunnel backend settings.
    pub backend: BackendConfig,

    /// Datagram tunnel settings.
    pub datagram: DatagramConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    /// Parse the value of the mode environment variable.
    ///
    /// Only `production` selects production; everything else is development.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            RunMode::Production
        } else {
            RunMode::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, RunMode::Production)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Development => write!(f, "development"),
            RunMode::Production => write!(f, "production"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port. 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// The `host:port` string handed to the socket layer.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Secret used to sign session cookies.
    pub secret: String,

    /// Cookie name.
    pub cookie_name: String,

    /// Session lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: DEVELOPMENT_SECRET.to_string(),
            cookie_name: "frontdoor.sid".to_string(),
            ttl_secs: 6 * 60 * 60,
        }
    }
}

/// A static directory exposed under a URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticMount {
    /// URL prefix, e.g. "/uv/".
    pub prefix: String,

    /// Directory on disk.
    pub dir: String,
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Root directory served at "/". Also holds `404.html`.
    pub public_dir: String,

    /// `max-age` of the immutable cache directive, in seconds.
    pub max_age_secs: u64,

    /// Extra directories served under fixed prefixes.
    pub mounts: Vec<StaticMount>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            public_dir: "public".to_string(),
            max_age_secs: 30 * 24 * 60 * 60,
            mounts: Vec::new(),
        }
    }
}

/// Generic tunnel backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Path prefix the backend claims.
    pub mount_prefix: String,

    /// Upstream backend address (`host:port`).
    pub upstream: Option<String>,

    /// Client-side libraries the backend ships, served as static roots.
    pub client_assets: Vec<StaticMount>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mount_prefix: "/bare/".to_string(),
            upstream: None,
            client_assets: Vec::new(),
        }
    }
}

/// Datagram tunnel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatagramConfig {
    /// Path suffix reserved for datagram tunnel upgrades.
    pub mount_suffix: String,

    /// Upstream datagram tunnel server (`host:port`).
    pub upstream: Option<String>,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            mount_suffix: "/wisp/".to_string(),
            upstream: None,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long plain HTTP connections may keep running after the
    /// listener has stopped.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
