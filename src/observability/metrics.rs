//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webservice_requests_total` (counter): dispatched requests by outcome
//! - `webservice_forward_total` (counter): upstream exchanges by result
//! - `webservice_template_refresh_total` (counter): published snapshots
//! - `webservice_templates_loaded` (gauge): entries in the current snapshot
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    counter!("webservice_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_forward(result: &'static str) {
    counter!("webservice_forward_total", "result" => result).increment(1);
}

pub fn record_template_refresh(loaded: usize) {
    counter!("webservice_template_refresh_total").increment(1);
    gauge!("webservice_templates_loaded").set(loaded as f64);
}
