//! Prometheus metrics for the quote store and its HTTP surface
//!
//! Counters are bumped by the HTTP handlers and the garbage collector;
//! record gauges are refreshed from store stats on every scrape.

use crate::storage::{CompactionStats, StoreStats};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::error;

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quotebook_operations_total", "Store operations by kind and outcome"),
        &["operation", "status"]
    ).unwrap();

    pub static ref COMPACTIONS_TOTAL: IntCounter = IntCounter::new(
        "quotebook_compactions_total",
        "Completed compaction passes"
    ).unwrap();

    pub static ref RECLAIMED_TOTAL: IntCounter = IntCounter::new(
        "quotebook_reclaimed_quotes_total",
        "Tombstoned quotes physically removed by compaction"
    ).unwrap();

    pub static ref COMPACTION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "quotebook_compaction_duration_seconds",
            "Time the store spent stopped for compaction"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    ).unwrap();

    pub static ref RECORDS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("quotebook_records", "Quotes held by the store"),
        &["state"]
    ).unwrap();
}

/// Register all collectors. Safe to call more than once.
pub fn init_metrics() {
    METRICS_REGISTRY.register(Box::new(OPERATIONS_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(COMPACTIONS_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(RECLAIMED_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(COMPACTION_DURATION.clone())).ok();
    METRICS_REGISTRY.register(Box::new(RECORDS.clone())).ok();
}

pub fn record_operation(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_compaction(stats: &CompactionStats) {
    COMPACTIONS_TOTAL.inc();
    RECLAIMED_TOTAL.inc_by(stats.reclaimed as u64);
    COMPACTION_DURATION.observe(stats.duration.as_secs_f64());
}

pub fn update_store_gauges(stats: &StoreStats) {
    RECORDS.with_label_values(&["alive"]).set(stats.alive as i64);
    RECORDS
        .with_label_values(&["tombstoned"])
        .set(stats.tombstones as i64);
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}
