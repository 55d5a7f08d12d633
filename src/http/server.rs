//! HTTP server loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve HTTP/1.1 with upgrade support on each connection
//! - Wire up middleware (request ID, tracing)
//! - Hand every request to the dispatcher
//! - Coordinate shutdown: stop accepting, close adapters, drain
//!
//! # Design Decisions
//! - One task per connection; classification never waits on other connections
//! - A dispatcher error closes the connection without writing a response
//! - The accept loop halts before any adapter is closed

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::http::request::PeerAddr;
use crate::lifecycle::shutdown::{with_deadline, Shutdown};
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::routing::Dispatcher;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Errors that stop the server loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The front door: accepts connections and dispatches their requests.
pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl Gateway {
    pub fn new(dispatcher: Dispatcher, drain_timeout: Duration) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            tracker: ConnectionTracker::new(),
            drain_timeout,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Live plain-HTTP connections.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Run until `shutdown` is triggered, then tear down in order and
    /// mark the lifecycle `Stopped`.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let result = self.accept_loop(&listener, &shutdown).await;

        // No connection is accepted past this point.
        drop(listener);
        shutdown.trigger();
        tracing::info!(address = %addr, "Listener closed, releasing adapters");

        for adapter in self.dispatcher.adapters() {
            if let Err(e) = adapter.close().await {
                tracing::error!(adapter = adapter.name(), error = %e, "Failed to close adapter");
            }
        }

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, timeout = ?self.drain_timeout, "Draining connections");
            with_deadline(self.drain_timeout, "connection drain", self.tracker.drained()).await;
        }

        shutdown.mark_stopped();
        tracing::info!("HTTP server stopped");
        result
    }

    async fn accept_loop(&self, listener: &Listener, shutdown: &Shutdown) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.draining() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit, shutdown),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        shutdown: &Shutdown,
    ) {
        let guard = self.tracker.track();
        let connection_id = guard.id();
        let dispatcher = self.dispatcher.clone();

        let dispatch = tower::service_fn(move |mut request: hyper::Request<Incoming>| {
            let dispatcher = dispatcher.clone();
            async move {
                request.extensions_mut().insert(PeerAddr(peer));
                dispatcher.dispatch(request.map(Body::new)).await
            }
        });

        let service = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(move |request: &hyper::Request<Incoming>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            %connection_id,
                            %peer,
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id,
                        )
                    })
                    .on_response(DefaultOnResponse::new().level(Level::INFO))
                    .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .service(dispatch);

        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;

            let connection = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
                .with_upgrades();
            tokio::pin!(connection);

            // Idle keep-alive connections close once draining starts;
            // in-flight requests finish first.
            let result = tokio::select! {
                result = connection.as_mut() => result,
                _ = shutdown.draining() => {
                    connection.as_mut().graceful_shutdown();
                    connection.as_mut().await
                }
            };
            if let Err(e) = result {
                tracing::debug!(%connection_id, %peer, error = %e, "Connection closed");
            }
        });
    }
}
