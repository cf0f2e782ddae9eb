//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pacmaster_requests_total` (counter): gateway requests by route, status
//! - `pacmaster_request_duration_seconds` (histogram): gateway latency by route
//! - `pacmaster_upstream_retries_total` (counter): retried adapter calls by route
//! - `pacmaster_auth_failures_total` (counter): failed authentications
//! - `pacmaster_adapter_operations_total` (counter): adapter executions by route, outcome
//!
//! Recording is a no-op until a recorder is installed, so tests need no setup.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "pacmaster_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("pacmaster_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(route: &str) {
    counter!("pacmaster_upstream_retries_total", "route" => route.to_string()).increment(1);
}

pub fn record_auth_failure() {
    counter!("pacmaster_auth_failures_total").increment(1);
}

pub fn record_adapter_operation(route: &str, outcome: &str) {
    counter!(
        "pacmaster_adapter_operations_total",
        "route" => route.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
