//! Prometheus metrics for tab occupancy and payment flow.
//!
//! Metrics are exposed in Prometheus text format on a separate listener when
//! `METRICS_BIND` is set. Without an installed recorder every call below is a
//! no-op, so handlers record unconditionally.
//!
//! # Metrics
//!
//! - `tabs_created_total`: tabs opened
//! - `tab_joins_total{outcome}`: join attempts by outcome
//! - `tab_transaction_conflicts_total{operation}`: retry budgets exhausted
//! - `payment_transitions_total{transition}`: lock, unlock, finalize and cancel
//!   requests that changed the tab
//! - `payment_noops_total{transition}`: repeats that found the tab already there
//! - `http_errors_total{code}`: error responses by error code

use dine_tab::tab::Transition;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

/// Increment tabs created counter.
pub fn tabs_created_total() {
    metrics::counter!("tabs_created_total").increment(1);
}

/// Record a join attempt (`accepted`, `full`, `rejected`).
pub fn tab_joins_total(outcome: &'static str) {
    metrics::counter!("tab_joins_total", "outcome" => outcome).increment(1);
}

/// Record an operation that ran out of optimistic retries.
pub fn tab_transaction_conflicts_total(operation: &'static str) {
    metrics::counter!("tab_transaction_conflicts_total", "operation" => operation).increment(1);
}

/// Record a payment lifecycle request under the counter for its outcome.
pub fn payment_transitions_total(transition: &'static str, outcome: Transition) {
    metrics::counter!(transition_counter(outcome), "transition" => transition).increment(1);
}

fn transition_counter(outcome: Transition) -> &'static str {
    match outcome {
        Transition::Applied => "payment_transitions_total",
        Transition::Unchanged => "payment_noops_total",
    }
}

/// Record an error response.
pub fn http_errors_total(code: &'static str) {
    metrics::counter!("http_errors_total", "code" => code).increment(1);
}
