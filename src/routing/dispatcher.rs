//! Connection dispatcher.
//!
//! # Responsibilities
//! - Classify every request as plain or upgrade
//! - Evaluate routing claims in a fixed priority order
//! - Hand the request to exactly one terminal handler
//! - Attach session identity for downstream adapters
//!
//! # Design Decisions
//! - Classification is synchronous and touches only the request itself
//!   (plus read-mostly session lookups)
//! - A failing claim check counts as "not claimed"; it never reaches the client
//! - The datagram mount is checked before the backend's broader upgrade claim
//! - Unclaimed upgrades are closed with no bytes written, but counted and logged

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{extract::Request, http::header, response::Response};

use crate::adapters::{AdapterError, ClaimError, TunnelAdapter};
use crate::http::request::is_upgrade;
use crate::observability::metrics;
use crate::session::SessionStore;
use crate::statics::StaticResponder;

/// Terminal handler for a plain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The tunnel backend claimed the request.
    Backend,
    /// Unclaimed: the static responder resolves it (or answers 404).
    Static,
    /// The claim check failed: straight to the not-found document.
    NotFound,
}

impl Route {
    pub fn label(&self) -> &'static str {
        match self {
            Route::Backend => "backend",
            Route::Static => "static",
            Route::NotFound => "not_found",
        }
    }
}

/// Terminal handler for an upgrade attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeRoute {
    /// The path ends with the reserved datagram suffix.
    Datagram,
    /// The tunnel backend claimed the upgrade.
    Backend,
    /// Nobody claimed it: close the socket without a response.
    Drop,
}

impl UpgradeRoute {
    pub fn label(&self) -> &'static str {
        match self {
            UpgradeRoute::Datagram => "upgrade_datagram",
            UpgradeRoute::Backend => "upgrade_backend",
            UpgradeRoute::Drop => "upgrade_dropped",
        }
    }
}

/// Why the dispatcher gave a connection no response.
///
/// Returned to the HTTP layer, which closes the connection without
/// writing any bytes.
#[derive(Debug, thiserror::Error)]
pub enum Unrouted {
    #[error("no handler claimed the upgrade to {path}")]
    UnclaimedUpgrade { path: String },

    #[error("{adapter} abandoned the upgrade: {source}")]
    Abandoned {
        adapter: &'static str,
        #[source]
        source: AdapterError,
    },
}

/// Counters for every dispatch outcome.
#[derive(Debug, Default)]
pub struct DispatchStats {
    backend: AtomicU64,
    statics: AtomicU64,
    not_found: AtomicU64,
    upgrade_datagram: AtomicU64,
    upgrade_backend: AtomicU64,
    upgrade_dropped: AtomicU64,
    upgrade_abandoned: AtomicU64,
    claim_errors: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub backend: u64,
    pub statics: u64,
    pub not_found: u64,
    pub upgrade_datagram: u64,
    pub upgrade_backend: u64,
    pub upgrade_dropped: u64,
    pub upgrade_abandoned: u64,
    pub claim_errors: u64,
}

impl DispatchStats {
    fn record_route(&self, route: Route) {
        let counter = match route {
            Route::Backend => &self.backend,
            Route::Static => &self.statics,
            Route::NotFound => &self.not_found,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_dispatch(route.label());
    }

    fn record_upgrade(&self, route: UpgradeRoute) {
        let counter = match route {
            UpgradeRoute::Datagram => &self.upgrade_datagram,
            UpgradeRoute::Backend => &self.upgrade_backend,
            UpgradeRoute::Drop => {
                metrics::record_upgrade_dropped();
                &self.upgrade_dropped
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_dispatch(route.label());
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            backend: self.backend.load(Ordering::Relaxed),
            statics: self.statics.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            upgrade_datagram: self.upgrade_datagram.load(Ordering::Relaxed),
            upgrade_backend: self.upgrade_backend.load(Ordering::Relaxed),
            upgrade_dropped: self.upgrade_dropped.load(Ordering::Relaxed),
            upgrade_abandoned: self.upgrade_abandoned.load(Ordering::Relaxed),
            claim_errors: self.claim_errors.load(Ordering::Relaxed),
        }
    }
}

/// Single authoritative router for every accepted request.
pub struct Dispatcher {
    backend: Arc<dyn TunnelAdapter>,
    datagram: Arc<dyn TunnelAdapter>,
    statics: StaticResponder,
    sessions: SessionStore,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn TunnelAdapter>,
        datagram: Arc<dyn TunnelAdapter>,
        statics: StaticResponder,
        sessions: SessionStore,
    ) -> Self {
        Self {
            backend,
            datagram,
            statics,
            sessions,
            stats: DispatchStats::default(),
        }
    }

    /// Route one request to exactly one handler.
    pub async fn dispatch(&self, request: Request) -> Result<Response, Unrouted> {
        if is_upgrade(request.headers()) {
            self.handle_upgrade(request).await
        } else {
            Ok(self.handle_request(request).await)
        }
    }

    /// Plain request: tunnel backend if it claims it, static responder otherwise.
    pub async fn handle_request(&self, mut request: Request) -> Response {
        let ensured = self.sessions.ensure(request.headers());
        request.extensions_mut().insert(ensured.session.clone());

        let route = self.classify_request(&request);
        self.stats.record_route(route);
        tracing::debug!(route = route.label(), path = %request.uri().path(), "Dispatching request");

        let mut response = match route {
            Route::Backend => self.backend.serve(request).await,
            Route::Static => self.statics.serve(request).await,
            Route::NotFound => self.statics.not_found(),
        };

        if let Some(cookie) = ensured.set_cookie {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }

    /// Upgrade attempt: datagram mount, then backend claim, then drop.
    pub async fn handle_upgrade(&self, mut request: Request) -> Result<Response, Unrouted> {
        if let Some(session) = self.sessions.lookup(request.headers()) {
            request.extensions_mut().insert(session);
        }

        let route = self.classify_upgrade(&request);
        self.stats.record_upgrade(route);

        let adapter = match route {
            UpgradeRoute::Datagram => &self.datagram,
            UpgradeRoute::Backend => &self.backend,
            UpgradeRoute::Drop => {
                let path = request.uri().path().to_string();
                tracing::info!(
                    path = %path,
                    upgrade = ?request.headers().get(header::UPGRADE),
                    "Dropping unclaimed upgrade"
                );
                return Err(Unrouted::UnclaimedUpgrade { path });
            }
        };

        tracing::debug!(route = route.label(), path = %request.uri().path(), "Dispatching upgrade");
        adapter.serve_upgrade(request).await.map_err(|source| {
            self.stats.upgrade_abandoned.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(adapter = adapter.name(), error = %source, "Adapter abandoned upgrade");
            Unrouted::Abandoned {
                adapter: adapter.name(),
                source,
            }
        })
    }

    /// Decide the handler for a plain request. Pure apart from counters.
    pub fn classify_request(&self, request: &Request) -> Route {
        match self.backend.claims(request) {
            Ok(true) => Route::Backend,
            Ok(false) => Route::Static,
            Err(e) => {
                self.claim_failed(self.backend.as_ref(), &e);
                Route::NotFound
            }
        }
    }

    /// Decide the handler for an upgrade. The datagram mount always wins;
    /// the backend is consulted only when it does not match.
    pub fn classify_upgrade(&self, request: &Request) -> UpgradeRoute {
        match self.datagram.claims_upgrade(request) {
            Ok(true) => return UpgradeRoute::Datagram,
            Ok(false) => {}
            Err(e) => self.claim_failed(self.datagram.as_ref(), &e),
        }

        match self.backend.claims_upgrade(request) {
            Ok(true) => UpgradeRoute::Backend,
            Ok(false) => UpgradeRoute::Drop,
            Err(e) => {
                self.claim_failed(self.backend.as_ref(), &e);
                UpgradeRoute::Drop
            }
        }
    }

    fn claim_failed(&self, adapter: &dyn TunnelAdapter, error: &ClaimError) {
        self.stats.claim_errors.fetch_add(1, Ordering::Relaxed);
        metrics::record_claim_error(adapter.name());
        tracing::debug!(adapter = adapter.name(), error = %error, "Claim check failed, treating as unclaimed");
    }

    /// Both adapters, backend first.
    pub fn adapters(&self) -> [&Arc<dyn TunnelAdapter>; 2] {
        [&self.backend, &self.datagram]
    }

    pub fn statics(&self) -> &StaticResponder {
        &self.statics
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }
}
