//! Metrics collection and exposition.
//!
//! # Metrics
//! - `signalmice_detection_cycles_total` (counter): cycles by outcome
//! - `signalmice_shutdown_attempts_total` (counter): attempts by method, result
//! - `signalmice_audit_events_dropped_total` (counter): events lost to a full audit queue
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus endpoint is opt-in; most deployments only read the audit log

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_cycle(outcome: &'static str) {
    ::metrics::counter!("signalmice_detection_cycles_total", "outcome" => outcome).increment(1);
}

pub fn record_shutdown_attempt(method: &str, succeeded: bool) {
    let result = if succeeded { "success" } else { "failure" };
    ::metrics::counter!(
        "signalmice_shutdown_attempts_total",
        "method" => method.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_audit_dropped() {
    ::metrics::counter!("signalmice_audit_events_dropped_total").increment(1);
}
