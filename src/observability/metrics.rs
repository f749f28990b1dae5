//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relay calls by outcome
//! - `relay_duration_seconds` (histogram): outbound call latency by outcome
//! - `history_writes_total` (counter): history inserts by result
//!
//! Outcome is `success` or the failure kind (`TIMEOUT`, `DNS_FAILURE`, ...).
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one relay call.
pub fn record_relay(outcome: &str, elapsed: Duration) {
    let outcome = outcome.to_string();
    metrics::counter!("relay_requests_total", "outcome" => outcome.clone()).increment(1);
    metrics::histogram!("relay_duration_seconds", "outcome" => outcome).record(elapsed.as_secs_f64());
}

/// Record one history insert; `result` is `ok` or `error`.
pub fn record_history_write(result: &'static str) {
    metrics::counter!("history_writes_total", "result" => result).increment(1);
}
