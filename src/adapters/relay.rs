//! Upgrade relaying.
//!
//! Replays the client's upgrade request against an upstream server. A
//! non-101 answer is handed back to the client as an ordinary response;
//! on 101 both upgraded streams are spliced until either side closes or
//! the owning adapter shuts down.

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{uri::Authority, StatusCode, Uri},
    response::Response,
};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::adapters::AdapterError;

/// Live tunnels owned by one adapter.
#[derive(Debug, Clone, Default)]
pub struct Tunnels {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Tunnels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spliced tunnels still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Relay an upgrade request to `upstream`.
    pub async fn relay(
        &self,
        mut request: Request,
        upstream: &Authority,
        adapter: &'static str,
    ) -> Result<Response, AdapterError> {
        let client_upgrade = hyper::upgrade::on(&mut request);

        let stream = TcpStream::connect(upstream.as_str())
            .await
            .map_err(|source| AdapterError::Connect {
                upstream: upstream.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY on upstream socket");
        }

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.with_upgrades().await {
                tracing::debug!(error = %e, "Upstream connection ended");
            }
        });

        let (mut parts, _) = request.into_parts();
        parts.uri = origin_form(&parts.uri);
        let path = parts.uri.to_string();
        let mut response = sender
            .send_request(Request::from_parts(parts, Body::empty()))
            .await?;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            tracing::debug!(
                adapter,
                status = %response.status(),
                path = %path,
                "Upstream declined upgrade"
            );
            return Ok(response.map(Body::new));
        }

        let upstream_upgrade = hyper::upgrade::on(&mut response);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            match tokio::try_join!(client_upgrade, upstream_upgrade) {
                Ok((client, upstream)) => splice(client, upstream, cancel, adapter).await,
                Err(e) => tracing::debug!(adapter, error = %e, "Upgrade did not complete"),
            }
        });

        let (parts, _) = response.into_parts();
        Ok(Response::from_parts(parts, Body::empty()))
    }

    /// Cut every live tunnel and wait (bounded) for the tasks to finish.
    pub async fn shutdown(&self, limit: Duration) -> bool {
        self.tracker.close();
        self.cancel.cancel();
        tokio::time::timeout(limit, self.tracker.wait()).await.is_ok()
    }
}

async fn splice(client: Upgraded, upstream: Upgraded, cancel: CancellationToken, adapter: &'static str) {
    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);

    tokio::select! {
        result = tokio::io::copy_bidirectional(&mut client, &mut upstream) => match result {
            Ok((to_upstream, to_client)) => {
                tracing::debug!(adapter, to_upstream, to_client, "Tunnel closed");
            }
            Err(e) => tracing::debug!(adapter, error = %e, "Tunnel failed"),
        },
        _ = cancel.cancelled() => tracing::debug!(adapter, "Tunnel cut by shutdown"),
    }
}

/// Reduce a target to origin form (`/path?query`).
fn origin_form(uri: &Uri) -> Uri {
    uri.path_and_query()
        .map(|pq| Uri::from(pq.clone()))
        .unwrap_or_else(|| Uri::from_static("/"))
}
