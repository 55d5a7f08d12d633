//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1 with upgrades, request ID, tracing)
//!     → request.rs (upgrade detection, peer address)
//!     → routing::Dispatcher (exactly one terminal handler)
//! ```

pub mod request;
pub mod server;

pub use request::{is_upgrade, PeerAddr};
pub use server::{Gateway, ServerError};
