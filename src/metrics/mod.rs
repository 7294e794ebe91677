//! Prometheus metrics for reconciliation passes
//!
//! This module tracks:
//! - Passes run and their duration
//! - Tags and rooms allocated, and pool exhaustion
//! - Repairs written per collection
//! - Per-record write failures per operation
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

use crate::reconcile::SyncReport;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all reconciliation metrics
struct ReconcileMetrics {
    passes: Counter,
    pass_duration: Histogram,
    allocations: CounterVec,
    exhaustions: CounterVec,
    repairs: CounterVec,
    inconsistencies: CounterVec,
}

/// Global storage for reconciliation metrics
static RECONCILE_METRICS: OnceLock<ReconcileMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup. If
/// registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = billet::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = ReconcileMetrics {
        passes: register_counter!(
            "billet_sync_passes_total",
            "Total number of reconciliation passes completed"
        )?,
        pass_duration: register_histogram!(
            "billet_sync_pass_duration_seconds",
            "Reconciliation pass duration in seconds",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        allocations: register_counter_vec!(
            "billet_allocations_total",
            "Resources allocated to trainees",
            &["resource"]
        )?,
        exhaustions: register_counter_vec!(
            "billet_exhaustions_total",
            "Trainees left without a resource because the pool was exhausted",
            &["resource"]
        )?,
        repairs: register_counter_vec!(
            "billet_repairs_total",
            "Derived state rewritten by reconciliation",
            &["collection"]
        )?,
        inconsistencies: register_counter_vec!(
            "billet_inconsistencies_total",
            "Per-record writes that failed",
            &["operation"]
        )?,
    };

    RECONCILE_METRICS
        .set(metrics)
        .map_err(|_| "Reconcile metrics already initialized")?;

    Ok(())
}

/// Check if metrics are initialized
pub fn metrics_initialized() -> bool {
    RECONCILE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a finished reconciliation pass
pub fn record_sync_pass(report: &SyncReport, duration: Duration) {
    let Some(m) = RECONCILE_METRICS.get() else {
        return;
    };

    m.passes.inc();
    m.pass_duration.observe(duration.as_secs_f64());

    m.allocations.with_label_values(&["tag"]).inc_by(report.allocated as f64);
    m.allocations
        .with_label_values(&["room"])
        .inc_by(report.rooms_assigned as f64);
    m.exhaustions.with_label_values(&["tag"]).inc_by(report.no_tags as f64);
    m.exhaustions.with_label_values(&["room"]).inc_by(report.no_rooms as f64);
    m.repairs
        .with_label_values(&["rooms"])
        .inc_by(report.rooms_updated as f64);
    m.repairs.with_label_values(&["tags"]).inc_by(report.tags_updated as f64);
    m.repairs
        .with_label_values(&["trainees"])
        .inc_by(report.status_corrected as f64);

    record_inconsistencies("sync", report.inconsistencies);
}

/// Record per-record failures of a batch operation
pub fn record_inconsistencies(operation: &str, count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = RECONCILE_METRICS.get() {
        m.inconsistencies
            .with_label_values(&[operation])
            .inc_by(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_metrics() {
        assert!(init_metrics().is_ok());
        // Second call should also be Ok (idempotent)
        assert!(init_metrics().is_ok());
        assert!(metrics_initialized());
    }

    #[test]
    #[serial]
    fn test_record_sync_pass_exposed() {
        let _ = init_metrics();
        let mut report = SyncReport::new(Utc::now());
        report.allocated = 2;
        report.inconsistencies = 1;
        record_sync_pass(&report, Duration::from_millis(20));

        let text = encode_metrics().unwrap();
        assert!(text.contains("billet_sync_passes_total"));
        assert!(text.contains("billet_allocations_total"));
    }

    #[test]
    fn test_zero_inconsistencies_is_noop() {
        record_inconsistencies("cleanup", 0);
    }
}
