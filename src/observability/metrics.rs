//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_sessions_total` (counter): forwarded sessions by mode, outcome
//! - `gateway_active_sessions` (gauge): sessions currently open
//! - `gateway_bytes_forwarded_total` (counter): relayed bytes by direction
//! - `gateway_requests_total` (counter): proxied HTTP requests by method, status
//! - `gateway_request_duration_seconds` (histogram): time to upstream headers
//! - `gateway_readiness_seconds` (gauge): time the engine took to accept
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_session(mode: &'static str, outcome: &'static str) {
    counter!("gateway_sessions_total", "mode" => mode, "outcome" => outcome).increment(1);
}

pub fn set_active_sessions(count: u64) {
    gauge!("gateway_active_sessions").set(count as f64);
}

pub fn record_bytes(direction: &'static str, bytes: u64) {
    counter!("gateway_bytes_forwarded_total", "direction" => direction).increment(bytes);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_readiness(elapsed: Duration) {
    gauge!("gateway_readiness_seconds").set(elapsed.as_secs_f64());
}
