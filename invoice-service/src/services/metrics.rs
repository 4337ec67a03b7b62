//! Prometheus metrics for invoice-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter, TextEncoder,
};

/// Ingested invoice counter.
pub static INVOICES_INGESTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "invoice_invoices_ingested_total",
        "Total number of extraction payloads ingested"
    )
    .expect("Failed to register invoices_ingested_total")
});

/// Reconciliation counter by result.
pub static RECONCILIATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_reconciliations_total",
        "Total number of invoice reconciliations by result",
        &["result"] // reconciled, no_allocations
    )
    .expect("Failed to register reconciliations_total")
});

/// Duplicate line items removed across all dedup passes.
pub static DUPLICATES_REMOVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "invoice_duplicates_removed_total",
        "Total number of duplicate line items removed"
    )
    .expect("Failed to register duplicates_removed_total")
});

/// Supplier resolution counter by method.
pub static SUPPLIERS_RESOLVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_suppliers_resolved_total",
        "Total number of supplier resolutions by method",
        &["method"] // exact, alias, fuzzy, created
    )
    .expect("Failed to register suppliers_resolved_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoice_db_query_duration_seconds",
        "Database query duration in seconds",
        &["query"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_INGESTED_TOTAL);
    Lazy::force(&RECONCILIATIONS_TOTAL);
    Lazy::force(&DUPLICATES_REMOVED_TOTAL);
    Lazy::force(&SUPPLIERS_RESOLVED_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
