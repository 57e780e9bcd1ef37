//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): executed requests by method, outcome
//! - `dispatch_request_duration_seconds` (histogram): submit-to-result latency
//! - `dispatch_in_flight` (gauge): running execution tasks
//! - `dispatch_rejected_total` (counter): submissions resolved without queueing
//! - `dispatch_abandoned_total` (counter): queued envelopes dropped at close
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are low-cardinality (method, outcome, reason); never URLs

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter, serving scrapes on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one executed request.
pub fn record_request(method: &str, outcome: &'static str, submitted_at: Instant) {
    counter!(
        "dispatch_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("dispatch_request_duration_seconds", "method" => method.to_string())
        .record(submitted_at.elapsed().as_secs_f64());
}

/// Record a submission resolved before reaching the queue.
pub fn record_rejected(reason: &'static str) {
    counter!("dispatch_rejected_total", "reason" => reason).increment(1);
}

/// Record queued envelopes dropped when the loop closed.
pub fn record_abandoned(count: usize) {
    counter!("dispatch_abandoned_total").increment(count as u64);
}
