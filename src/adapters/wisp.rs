//! Datagram tunnel adapter.
//!
//! Upgrade-only: plain requests are never claimed. Upgrades whose path
//! ends with the reserved suffix are relayed to the datagram tunnel
//! server, which speaks the multiplexing protocol itself.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{uri::Authority, StatusCode},
    response::{IntoResponse, Response},
};

use crate::adapters::{AdapterError, ClaimError, TunnelAdapter, Tunnels};
use crate::config::DatagramConfig;
use crate::routing::matcher::{target_path, Matcher, PathSuffix};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DatagramTunnel {
    mount: PathSuffix,
    upstream: Option<Authority>,
    tunnels: Tunnels,
    closed: AtomicBool,
}

impl DatagramTunnel {
    pub fn new(config: &DatagramConfig) -> Self {
        let upstream = config.upstream.as_deref().and_then(|addr| {
            Authority::from_str(addr)
                .map_err(|e| tracing::warn!(upstream = addr, error = %e, "Ignoring datagram upstream"))
                .ok()
        });

        Self {
            mount: PathSuffix::new(config.mount_suffix.clone()),
            upstream,
            tunnels: Tunnels::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// The reserved upgrade path suffix.
    pub fn mount_suffix(&self) -> &str {
        self.mount.as_str()
    }

    /// Number of live datagram tunnels.
    pub fn active_tunnels(&self) -> usize {
        self.tunnels.active()
    }
}

#[async_trait]
impl TunnelAdapter for DatagramTunnel {
    fn name(&self) -> &'static str {
        "wisp"
    }

    fn claims(&self, _request: &Request) -> Result<bool, ClaimError> {
        Ok(false)
    }

    fn claims_upgrade(&self, request: &Request) -> Result<bool, ClaimError> {
        Ok(self.mount.matches(target_path(request)?))
    }

    async fn serve(&self, _request: Request) -> Response {
        // Never claimed; the dispatcher does not route plain requests here.
        StatusCode::NOT_FOUND.into_response()
    }

    async fn serve_upgrade(&self, request: Request) -> Result<Response, AdapterError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed);
        }
        let Some(upstream) = &self.upstream else {
            tracing::warn!(path = %request.uri().path(), "Datagram tunnel has no upstream");
            return Err(AdapterError::NoUpstream);
        };
        self.tunnels.relay(request, upstream, self.name()).await
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let active = self.tunnels.active();
        if !self.tunnels.shutdown(CLOSE_TIMEOUT).await {
            tracing::warn!(active, "Datagram tunnels did not stop in time");
        }
        tracing::info!(active, "Datagram tunnel closed");
        Ok(())
    }
}
