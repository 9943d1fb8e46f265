//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define channel directory and connection metrics
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `namespace_created_total` (counter): channels created, by origin
//! - `namespace_rejected_total` (counter): channel requests refused, by reason
//! - `namespace_expired_total` (counter): channels evicted by a sweep
//! - `namespace_expire_callback_faults_total` (counter): failed expire callbacks
//! - `namespace_active` (gauge): live channels
//! - `namespace_sweep_duration_seconds` (histogram): time spent per sweep
//! - `websocket_connections_active` (gauge): live transport connections
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users and
//!   tests pay nothing
//! - Labels are small closed sets (origin, reason)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_channel_created(origin: &str) {
    metrics::counter!("namespace_created_total", "origin" => origin.to_string()).increment(1);
}

pub fn record_channel_rejected(reason: &str) {
    metrics::counter!("namespace_rejected_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_channel_expired() {
    metrics::counter!("namespace_expired_total").increment(1);
}

pub fn record_expire_fault() {
    metrics::counter!("namespace_expire_callback_faults_total").increment(1);
}

pub fn set_active_channels(count: usize) {
    metrics::gauge!("namespace_active").set(count as f64);
}

pub fn record_sweep(elapsed: Duration) {
    metrics::histogram!("namespace_sweep_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}
