//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BACKEND_REQUESTS_TOTAL, BACKEND_REQUEST_LATENCY, BROADCASTS_TOTAL, COMPOSER_SESSIONS_ACTIVE,
    COMPOSER_SESSIONS_EXPIRED_TOTAL, STALE_COUNTS_DISCARDED_TOTAL, STEP_TRANSITIONS_TOTAL,
    VALIDATIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

/// Helper struct for composer session metrics
pub struct ComposerMetrics;

impl ComposerMetrics {
    pub fn set_active_sessions(count: usize) {
        COMPOSER_SESSIONS_ACTIVE.set(count as i64);
    }

    pub fn record_expired(count: u64) {
        COMPOSER_SESSIONS_EXPIRED_TOTAL.inc_by(count);
    }

    /// Record a validation run
    pub fn record_validation(valid: bool) {
        VALIDATIONS_TOTAL
            .with_label_values(&[if valid { "valid" } else { "invalid" }])
            .inc();
    }

    /// Record a step transition attempt ("next" or "previous")
    pub fn record_transition(direction: &str, ok: bool) {
        STEP_TRANSITIONS_TOTAL
            .with_label_values(&[direction, outcome(ok)])
            .inc();
    }

    pub fn record_stale_count() {
        STALE_COUNTS_DISCARDED_TOTAL.inc();
    }
}

/// Helper struct for broadcast send metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record_sent() {
        BROADCASTS_TOTAL.with_label_values(&["sent"]).inc();
    }

    pub fn record_scheduled() {
        BROADCASTS_TOTAL.with_label_values(&["scheduled"]).inc();
    }

    pub fn record_failed() {
        BROADCASTS_TOTAL.with_label_values(&["failed"]).inc();
    }
}

/// Helper struct for backend metrics
pub struct BackendMetrics;

impl BackendMetrics {
    /// Record one backend request with its latency
    pub fn record_request(backend: &str, operation: &str, latency_secs: f64, ok: bool) {
        BACKEND_REQUEST_LATENCY
            .with_label_values(&[backend, operation])
            .observe(latency_secs);
        BACKEND_REQUESTS_TOTAL
            .with_label_values(&[backend, operation, outcome(ok)])
            .inc();
    }
}
