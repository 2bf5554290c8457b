//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (dispatches, latency, RPC calls, sessions)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `unit_router_dispatch_total` (counter): dispatches by method, status, route
//! - `unit_router_dispatch_duration_seconds` (histogram): dispatch latency
//! - `unit_router_rpc_calls_total` (counter): outbound unit calls by method, outcome
//! - `unit_router_rpc_duration_seconds` (histogram): outbound unit call latency
//! - `unit_router_sessions` (gauge): open sessions in the last reporting pool
//! - `unit_router_broadcast_dropped_total` (counter): sessions dropped by a failed send
//!
//! # Design Decisions
//! - Labels for route pattern (never the raw path), method, status code
//! - Recording without an installed recorder is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter, serving scrapes on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatch through a router.
pub fn record_dispatch(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    metrics::counter!("unit_router_dispatch_total", &labels).increment(1);
    metrics::histogram!("unit_router_dispatch_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record one outbound unit call. `outcome` is `success`, `failure` or `transport_error`.
pub fn record_rpc(method: &str, outcome: &'static str, start: Instant) {
    let labels = [("method", method.to_string()), ("outcome", outcome.to_string())];
    metrics::counter!("unit_router_rpc_calls_total", &labels).increment(1);
    metrics::histogram!("unit_router_rpc_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_sessions(count: usize) {
    metrics::gauge!("unit_router_sessions").set(count as f64);
}

pub fn record_broadcast_dropped(count: usize) {
    metrics::counter!("unit_router_broadcast_dropped_total").increment(count as u64);
}
