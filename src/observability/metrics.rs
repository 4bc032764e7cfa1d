//! Metrics collection and exposition.
//!
//! # Metrics
//! - `format_daemon_requests_total` (counter): requests by endpoint, status
//! - `format_daemon_request_duration_seconds` (histogram): request latency
//! - `format_daemon_format_duration_seconds` (histogram): engine time by lane
//! - `format_daemon_cold_starts_total` (counter): cold starts by outcome
//! - `format_daemon_serial_queue_depth` (gauge): units on the serialized lane
//! - `format_daemon_in_flight_requests` (gauge): requests being served
//!
//! # Design Decisions
//! - Recording is always on and cheap; the Prometheus exporter is optional
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one served request.
pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!("format_daemon_requests_total", "endpoint" => endpoint, "status" => status)
        .increment(1);
    metrics::histogram!("format_daemon_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}
