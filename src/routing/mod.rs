//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (upgrade?, path, headers)
//!     → dispatcher.rs (fixed-order claim evaluation)
//!     → matcher.rs (mount prefix / suffix checks inside adapters)
//!     → Return: Route | UpgradeRoute
//!
//! Plain:    Backend claim? → Backend : Static (→ asset or 404)
//! Upgrade:  Datagram suffix? → Datagram : Backend claim? → Backend : Drop
//! ```
//!
//! # Design Decisions
//! - Mounts fixed at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always takes the same route
//! - First match wins, and nothing runs after a match

pub mod dispatcher;
pub mod matcher;

pub use dispatcher::{DispatchSnapshot, Dispatcher, Route, Unrouted, UpgradeRoute};
pub use matcher::{Matcher, PathPrefix, PathSuffix};
