//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pipeline metrics (requests, latency, forwards, aborts)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `keel_requests_total` (counter): handled requests by outcome, status
//! - `keel_request_duration_seconds` (histogram): latency distribution
//! - `keel_dispatch_forwards_total` (counter): dispatcher forward hops
//! - `keel_events_aborted_total` (counter): aborts by event name
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so the pipeline
//!   never depends on the exporter being enabled
//! - Labels are low-cardinality: outcome, status code, event name

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::events::EventKind;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(outcome: &'static str, status: u16, started: Instant) {
    metrics::counter!(
        "keel_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("keel_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record one dispatcher forward hop.
pub fn record_forward() {
    metrics::counter!("keel_dispatch_forwards_total").increment(1);
}

/// Record a request stopped by an event subscriber.
pub fn record_abort(event: EventKind) {
    metrics::counter!("keel_events_aborted_total", "event" => event.name()).increment(1);
}
