//! Prometheus metrics for the broadcast composer.
//!
//! - Validation outcomes and wizard step transitions
//! - Broadcast sends by outcome
//! - Backend request counts and latency
//! - Composer session gauge and stale audience counts

mod helpers;

pub use helpers::{encode_metrics, BackendMetrics, BroadcastMetrics, ComposerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "carryofy";

lazy_static! {
    // ============================================================================
    // Composer Metrics
    // ============================================================================

    /// Number of live composer sessions
    pub static ref COMPOSER_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_composer_sessions_active", METRIC_PREFIX),
        "Number of live composer sessions"
    ).unwrap();

    /// Sessions removed by the idle cleanup task
    pub static ref COMPOSER_SESSIONS_EXPIRED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_composer_sessions_expired_total", METRIC_PREFIX),
        "Total composer sessions expired after inactivity"
    ).unwrap();

    /// Draft validations by outcome (valid/invalid)
    pub static ref VALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_validations_total", METRIC_PREFIX),
        "Total draft validations",
        &["outcome"]
    ).unwrap();

    /// Wizard step transitions by direction and outcome
    pub static ref STEP_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_step_transitions_total", METRIC_PREFIX),
        "Total wizard step transitions",
        &["direction", "outcome"]
    ).unwrap();

    /// Audience count responses dropped because a newer request superseded them
    pub static ref STALE_COUNTS_DISCARDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_stale_audience_counts_discarded_total", METRIC_PREFIX),
        "Total audience count responses discarded as stale"
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Broadcast create calls by outcome (sent/scheduled/failed)
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcasts submitted",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Backend Metrics
    // ============================================================================

    /// Backend requests by operation and outcome
    pub static ref BACKEND_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_backend_requests_total", METRIC_PREFIX),
        "Total requests to the Carryofy backend",
        &["backend", "operation", "outcome"]
    ).unwrap();

    /// Backend request latency
    pub static ref BACKEND_REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_backend_request_latency_seconds", METRIC_PREFIX),
        "Backend request latency in seconds",
        &["backend", "operation"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_registered() {
        ComposerMetrics::record_validation(true);
        BackendMetrics::record_request("memory", "audience_count", 0.01, true);

        let output = encode_metrics().unwrap();
        assert!(output.contains("carryofy_validations_total"));
        assert!(output.contains("carryofy_backend_request_latency_seconds"));
    }
}
