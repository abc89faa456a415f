//! Metrics module
//!
//! Prometheus metrics for the HTTP integration layer. The gate core never
//! touches these; [`GateService`](crate::gate::GateService) records them.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    pub static ref GATE_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "authz_gate_requests_total",
        "Requests seen by the authorization gate",
        &["outcome"]  // skipped, allowed, forbidden, error
    ).unwrap();

    pub static ref DECISION_DURATION: HistogramVec = register_histogram_vec!(
        "authz_gate_decision_duration_seconds",
        "Time spent deciding on a non-skipped request",
        &["outcome"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
    ).unwrap();

    pub static ref UPSTREAM_ERRORS_TOTAL: Counter = register_counter!(
        "authz_gate_upstream_errors_total",
        "Authorized requests the upstream failed to answer"
    ).unwrap();
}

/// Record the gate outcome of one request
pub fn record_gate_outcome(outcome: &str) {
    GATE_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record how long a decision took
pub fn record_decision_duration(outcome: &str, duration_secs: f64) {
    DECISION_DURATION
        .with_label_values(&[outcome])
        .observe(duration_secs);
}

/// Record an upstream failure
pub fn record_upstream_error() {
    UPSTREAM_ERRORS_TOTAL.inc();
}
