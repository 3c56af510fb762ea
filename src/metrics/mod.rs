//! Metrics module
//!
//! Prometheus counters for issued and rejected signatures.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter_vec, CounterVec, Histogram,
    IntCounterVec,
};

lazy_static! {
    pub static ref SIGNATURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "s3du_signatures_total",
        "Signing requests by outcome",
        &["status"]  // "issued", "rejected" or "failed"
    ).unwrap();

    pub static ref SIGNING_DURATION: Histogram = register_histogram!(
        "s3du_signing_duration_seconds",
        "Time spent building and signing a policy",
        vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01]
    ).unwrap();

    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "s3du_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a signature handed out to a client
pub fn record_signature_issued(duration_secs: f64) {
    SIGNATURES_TOTAL.with_label_values(&["issued"]).inc();
    SIGNING_DURATION.observe(duration_secs);
}

/// Record a request turned away before signing
pub fn record_signature_rejected(error_type: &str) {
    SIGNATURES_TOTAL.with_label_values(&["rejected"]).inc();
    record_error(error_type);
}

/// Record a request that failed on the server side
pub fn record_signature_failed(error_type: &str) {
    SIGNATURES_TOTAL.with_label_values(&["failed"]).inc();
    record_error(error_type);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
