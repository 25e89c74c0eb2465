//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by target, method, status
//! - `edge_request_duration_seconds` (histogram): latency by target
//! - `edge_routing_misses_total` (counter): requests for unknown hosts
//! - `edge_upstream_failures_total` (counter): proxy failures by upstream, kind
//! - `edge_rpc_calls_total` (counter): calls by procedure, outcome
//! - `edge_certificates_issued_total` (counter): issued or generated certificates
//! - `edge_active_connections` (gauge): open client connections
//!
//! # Design Decisions
//! - Recorder installed once at startup; the handle renders `/metrics`
//! - Label values come from configuration or registered names, never raw input

use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used to render it.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            tracing::info!("Metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install metrics recorder");
            None
        }
    }
}

pub fn record_request(target: &'static str, method: &str, status: u16, started: Instant) {
    counter!(
        "edge_requests_total",
        "target" => target,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("edge_request_duration_seconds", "target" => target)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_routing_miss() {
    counter!("edge_routing_misses_total").increment(1);
}

pub fn record_upstream_failure(upstream: &str, kind: &'static str) {
    counter!(
        "edge_upstream_failures_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_rpc_call(procedure: &str, outcome: &'static str) {
    counter!(
        "edge_rpc_calls_total",
        "procedure" => procedure.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_certificate_issued(mode: &'static str) {
    counter!("edge_certificates_issued_total", "mode" => mode).increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("edge_active_connections").set(count as f64);
}
