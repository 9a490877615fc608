//! Tests for utility functions

use prometheus_concurrency::util::{init_tracing, init_tracing_with, DEFAULT_LOG_FILTER};

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    // A subscriber now exists, so later calls leave it in place.
    assert!(!init_tracing_with("debug"));
    init_tracing();
    tracing::info!("tracing initialized for tests");
}

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_LOG_FILTER.starts_with("prometheus_concurrency"));
}
