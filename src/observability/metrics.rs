//! Metrics collection and exposition.
//!
//! # Metrics
//! - `forward_requests_total` (counter): forwarding calls by outcome
//! - `forward_upstream_status_total` (counter): upstream status codes
//! - `forward_duration_seconds` (histogram): time spent in `send()`
//! - `forward_response_bytes` (histogram): bytes emitted to the caller
//!
//! Recording goes through the `metrics` facade and is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the end of one forwarding call.
pub fn record_forward(outcome: &'static str, start: Instant) {
    counter!("forward_requests_total", "outcome" => outcome).increment(1);
    histogram!("forward_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record a completed upstream exchange.
pub fn record_upstream(status: u16, body_bytes: usize) {
    counter!("forward_upstream_status_total", "status" => status.to_string()).increment(1);
    histogram!("forward_response_bytes").record(body_bytes as f64);
}
