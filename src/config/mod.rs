//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (PORT / APP_ENV / SESSION_SECRET overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, resolve_config, ConfigError, IgnoredEnv};
pub use schema::{
    BackendConfig, DatagramConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, RunMode,
    SessionConfig, ShutdownConfig, StaticConfig, StaticMount, MAX_SESSION_TTL_SECS,
};
pub use validation::{validate_config, ValidationError};
