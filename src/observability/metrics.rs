//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): dispatched requests by method, status
//! - `router_request_duration_seconds` (histogram): dispatch latency
//! - `router_middleware_denied_total` (counter): requests stopped by middleware
//!
//! # Design Decisions
//! - Recording is always on; without an installed exporter the macros are no-ops
//! - The Prometheus endpoint is optional and runs on its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_dispatch(method: &str, status: u16, started: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!("router_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    metrics::histogram!("router_request_duration_seconds", "method" => method, "status" => status)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_middleware_denied() {
    metrics::counter!("router_middleware_denied_total").increment(1);
}
