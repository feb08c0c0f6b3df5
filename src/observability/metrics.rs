//! Metrics collection and exposition.
//!
//! # Metrics
//! - `poller_ticks_total` (counter): tick outcomes by poller and outcome
//!   (`fetched`, `skipped`, `failed`, `status_changed`)
//! - `poller_status_changes_total` (counter): observed status transitions
//! - `poller_backoff_triggers_total` (counter): overload signals received
//! - `poller_backoff_level` (gauge): current backoff level
//! - `poller_paused` (gauge): 1 while polling is suspended, else 0
//! - `poller_transport_responses_total` (counter): backend responses by status

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_tick(poller: &str, outcome: &'static str) {
    counter!("poller_ticks_total", "poller" => poller.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_status_change(poller: &str) {
    counter!("poller_status_changes_total", "poller" => poller.to_string()).increment(1);
}

pub fn record_backoff_trigger() {
    counter!("poller_backoff_triggers_total").increment(1);
}

pub fn record_backoff_state(level: u32, paused: bool) {
    gauge!("poller_backoff_level").set(level as f64);
    gauge!("poller_paused").set(if paused { 1.0 } else { 0.0 });
}

pub fn record_transport_response(status: u16) {
    counter!("poller_transport_responses_total", "status" => status.to_string()).increment(1);
}
