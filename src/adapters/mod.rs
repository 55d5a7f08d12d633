//! Tunnel adapters.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → claims / claims_upgrade (pure predicates)
//!     → serve / serve_upgrade (adapter owns the connection from here)
//!
//! bare.rs:  generic tunnel backend (HTTP forwarding + upgrade relay)
//! wisp.rs:  datagram tunnel (upgrade-only relay)
//! relay.rs: upgrade splicing shared by both
//! ```
//!
//! # Design Decisions
//! - Adapters are capabilities behind one trait, selected by the dispatcher
//! - Protocol internals stay upstream; adapters only move bytes
//! - `close` cuts live tunnels; in-flight plain requests finish on their own

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

use crate::config::StaticMount;

pub mod bare;
pub mod relay;
pub mod wisp;

pub use bare::BareBackend;
pub use relay::Tunnels;
pub use wisp::DatagramTunnel;

/// A claim check could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("request target has no routable path: {0}")]
    MalformedTarget(String),
}

/// An adapter could not take over a connection.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("no upstream configured")]
    NoUpstream,

    #[error("adapter is closed")]
    Closed,

    #[error("failed to connect to upstream {upstream}: {source}")]
    Connect {
        upstream: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] hyper::Error),
}

/// Capability interface of an externally supplied tunneling subsystem.
///
/// Once `serve` or `serve_upgrade` is called the adapter owns the
/// connection: it writes the response, streams, and closes.
#[async_trait]
pub trait TunnelAdapter: Send + Sync {
    /// Label for logs and metrics.
    fn name(&self) -> &'static str;

    /// Whether the adapter handles this plain request. Side-effect free.
    fn claims(&self, request: &Request) -> Result<bool, ClaimError>;

    /// Whether the adapter handles this upgrade attempt. Side-effect free.
    fn claims_upgrade(&self, request: &Request) -> Result<bool, ClaimError>;

    /// Handle a claimed plain request.
    async fn serve(&self, request: Request) -> Response;

    /// Take over a claimed upgrade. `Err` abandons the connection, which
    /// is then closed without a response.
    async fn serve_upgrade(&self, request: Request) -> Result<Response, AdapterError>;

    /// Client-side asset directories this adapter ships.
    fn static_roots(&self) -> Vec<StaticMount> {
        Vec::new()
    }

    /// Release listening resources and live tunnels.
    async fn close(&self) -> Result<(), AdapterError>;
}
