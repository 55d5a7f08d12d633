//! Generic tunnel backend adapter.
//!
//! # Responsibilities
//! - Claim requests under the backend mount prefix while open
//! - Forward claimed requests to the upstream backend server
//! - Relay claimed upgrades to the same upstream
//!
//! # Design Decisions
//! - Streaming bodies in both directions, no buffering
//! - Hop-by-hop headers stripped, X-Forwarded-For appended
//! - Upstream failures become 502; a missing upstream is 503

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{
        header::HeaderValue,
        uri::{Authority, Scheme},
        StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::adapters::{AdapterError, ClaimError, TunnelAdapter, Tunnels};
use crate::config::{BackendConfig, StaticMount};
use crate::http::request::PeerAddr;
use crate::routing::matcher::{target_path, Matcher, PathPrefix};
use crate::security::headers::strip_hop_by_hop;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards requests under its mount prefix to an upstream tunnel backend.
pub struct BareBackend {
    mount: PathPrefix,
    upstream: Option<Authority>,
    client: Client<HttpConnector, Body>,
    client_assets: Vec<StaticMount>,
    tunnels: Tunnels,
    closed: AtomicBool,
}

impl BareBackend {
    /// Build from config. Upstreams are validated beforehand; an
    /// unparseable one is treated as absent.
    pub fn new(config: &BackendConfig) -> Self {
        let upstream = config.upstream.as_deref().and_then(|addr| {
            Authority::from_str(addr)
                .map_err(|e| tracing::warn!(upstream = addr, error = %e, "Ignoring backend upstream"))
                .ok()
        });

        Self {
            mount: PathPrefix::new(config.mount_prefix.clone()),
            upstream,
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            client_assets: config.client_assets.clone(),
            tunnels: Tunnels::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn routes(&self, request: &Request) -> Result<bool, ClaimError> {
        let path = target_path(request)?;
        Ok(!self.is_closed() && self.mount.matches(path))
    }

    fn upstream_uri(&self, upstream: &Authority, uri: &Uri) -> Option<Uri> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(upstream.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().ok()?);
        }
        Uri::from_parts(parts).ok()
    }
}

#[async_trait]
impl TunnelAdapter for BareBackend {
    fn name(&self) -> &'static str {
        "bare"
    }

    fn claims(&self, request: &Request) -> Result<bool, ClaimError> {
        self.routes(request)
    }

    fn claims_upgrade(&self, request: &Request) -> Result<bool, ClaimError> {
        self.routes(request)
    }

    async fn serve(&self, request: Request) -> Response {
        let Some(upstream) = &self.upstream else {
            tracing::warn!(path = %request.uri().path(), "Tunnel backend has no upstream");
            return (StatusCode::SERVICE_UNAVAILABLE, "Tunnel backend unavailable").into_response();
        };

        let peer = request.extensions().get::<PeerAddr>().copied();
        let (mut parts, body) = request.into_parts();
        let Some(uri) = self.upstream_uri(upstream, &parts.uri) else {
            return (StatusCode::BAD_GATEWAY, "Invalid upstream target").into_response();
        };
        parts.uri = uri;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(PeerAddr(addr)) = peer {
            if let Ok(value) = HeaderValue::from_str(&addr.ip().to_string()) {
                parts.headers.append(X_FORWARDED_FOR, value);
            }
        }

        tracing::debug!(upstream = %upstream, path = %parts.uri.path(), "Forwarding to tunnel backend");

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %upstream, error = %e, "Upstream error");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }

    async fn serve_upgrade(&self, request: Request) -> Result<Response, AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::Closed);
        }
        let upstream = self.upstream.as_ref().ok_or(AdapterError::NoUpstream)?;
        self.tunnels.relay(request, upstream, self.name()).await
    }

    fn static_roots(&self) -> Vec<StaticMount> {
        self.client_assets.clone()
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let active = self.tunnels.active();
        if !self.tunnels.shutdown(CLOSE_TIMEOUT).await {
            tracing::warn!(active, "Tunnel backend relays did not stop in time");
        }
        tracing::info!(active, "Tunnel backend closed");
        Ok(())
    }
}
