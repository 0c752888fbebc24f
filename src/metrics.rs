//! Prometheus metrics for crtsh-monitor
//!
//! Counts selections by outcome and records how long they take and how much they return.

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use tracing::warn;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Selections executed
    /// Labels: outcome="success|invalid_argument|data_source|mapping"
    pub static ref SELECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "crtsh_monitor_selections_total",
            "Total number of certificate selections"
        ),
        &["outcome"]
    ).expect("metric cannot be created");

    /// Selection duration in seconds, successful or not
    pub static ref SELECTION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "crtsh_monitor_selection_duration_seconds",
            "Duration of certificate selections in seconds"
        )
        .buckets(vec![
            0.010, 0.050, 0.100, 0.250, 0.500,  // 10ms to 500ms
            1.0, 2.5, 5.0, 10.0, 30.0, 60.0     // certwatch queries can be slow
        ])
    ).expect("metric cannot be created");

    /// Certificates returned across all selections
    pub static ref CERTIFICATES_RETURNED_TOTAL: IntCounter = IntCounter::new(
        "crtsh_monitor_certificates_returned_total",
        "Total number of certificates returned by selections"
    ).expect("metric cannot be created");
}

/// Register all metrics with [`REGISTRY`]
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(SELECTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SELECTION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATES_RETURNED_TOTAL.clone()))?;

    Ok(())
}

/// Record the outcome of one selection
pub fn record_selection(outcome: &str, elapsed_secs: f64, returned: usize) {
    SELECTIONS_TOTAL.with_label_values(&[outcome]).inc();
    SELECTION_DURATION.observe(elapsed_secs);
    CERTIFICATES_RETURNED_TOTAL.inc_by(returned as u64);
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_selection() {
        let before = SELECTIONS_TOTAL.with_label_values(&["success"]).get();
        let returned_before = CERTIFICATES_RETURNED_TOTAL.get();

        record_selection("success", 0.02, 5);

        assert!(SELECTIONS_TOTAL.with_label_values(&["success"]).get() > before);
        assert!(CERTIFICATES_RETURNED_TOTAL.get() >= returned_before + 5);
    }

    #[test]
    fn test_export_after_init() {
        // Another test may have registered already
        let _ = init_metrics();
        record_selection("data_source", 1.5, 0);

        let output = export_metrics();
        assert!(output.contains("crtsh_monitor_selections_total"));
        assert!(output.contains("crtsh_monitor_selection_duration_seconds"));
    }
}
