//! Startup orchestration.
//!
//! # Responsibilities
//! - Build adapters, the static asset map and the session store
//! - Assemble the dispatcher from those parts
//! - Install the metrics exporter when enabled
//! - Bind the listener last
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{BareBackend, DatagramTunnel, TunnelAdapter};
use crate::config::{GatewayConfig, StaticMount};
use crate::http::Gateway;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::Dispatcher;
use crate::session::{SessionError, SessionStore};
use crate::statics::{AssetMap, StaticResponder};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to load static assets from {dir}: {source}")]
    Assets {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Build the dispatcher and everything it owns.
pub fn build_dispatcher(config: &GatewayConfig) -> Result<Dispatcher, StartupError> {
    let backend: Arc<dyn TunnelAdapter> = Arc::new(BareBackend::new(&config.backend));
    let datagram: Arc<dyn TunnelAdapter> = Arc::new(DatagramTunnel::new(&config.datagram));

    let mut assets = AssetMap::new();
    load_mount(&mut assets, "/", &config.statics.public_dir)?;
    let mounts = config
        .statics
        .mounts
        .iter()
        .cloned()
        .chain(backend.static_roots())
        .chain(datagram.static_roots());
    for StaticMount { prefix, dir } in mounts {
        load_mount(&mut assets, &prefix, &dir)?;
    }
    tracing::info!(assets = assets.len(), "Static assets ready");

    let statics = StaticResponder::new(assets, config.statics.max_age_secs);
    let sessions = SessionStore::new(&config.session, config.mode.is_production())?;

    Ok(Dispatcher::new(backend, datagram, statics, sessions))
}

fn load_mount(assets: &mut AssetMap, prefix: &str, dir: &str) -> Result<(), StartupError> {
    assets
        .load_dir(prefix, Path::new(dir))
        .map(|_| ())
        .map_err(|source| StartupError::Assets {
            dir: dir.to_string(),
            source,
        })
}

/// Bring up every subsystem and bind the listener.
pub async fn start(config: &GatewayConfig) -> Result<(Gateway, Listener), StartupError> {
    tracing::info!(
        mode = %config.mode,
        backend_mount = %config.backend.mount_prefix,
        datagram_suffix = %config.datagram.mount_suffix,
        "Starting front door"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let dispatcher = build_dispatcher(config)?;
    let gateway = Gateway::new(
        dispatcher,
        Duration::from_secs(config.shutdown.drain_timeout_secs),
    );

    let listener = Listener::bind(&config.listener).await?;
    Ok((gateway, listener))
}
