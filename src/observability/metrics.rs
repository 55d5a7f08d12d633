//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frontdoor_dispatch_total` (counter): terminal routing decisions by route
//! - `frontdoor_upgrade_dropped_total` (counter): upgrades closed without a handler
//! - `frontdoor_claim_errors_total` (counter): claim checks that failed, by adapter
//! - `frontdoor_sessions_minted_total` (counter): new sessions issued
//! - `frontdoor_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(route: &'static str) {
    counter!("frontdoor_dispatch_total", "route" => route).increment(1);
}

pub fn record_upgrade_dropped() {
    counter!("frontdoor_upgrade_dropped_total").increment(1);
}

pub fn record_claim_error(adapter: &'static str) {
    counter!("frontdoor_claim_errors_total", "adapter" => adapter).increment(1);
}

pub fn record_session_minted() {
    counter!("frontdoor_sessions_minted_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("frontdoor_active_connections").set(count as f64);
}
