// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Kiln operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `kiln_firestoned_io_` (prometheus-safe version of "kiln.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconcile counts and durations per resource type
//! - **Build Metrics** - builds created and garbage collected
//! - **Keychain Metrics** - credential cache hits and misses
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln::metrics::record_reconciliation;
//!
//! record_reconciliation("Image", "success", std::time::Duration::from_millis(120));
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all Kiln metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "kiln_firestoned_io";

/// Global Prometheus metrics registry.
///
/// All metrics are registered here and exposed via the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `Image`, `Build`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds by resource type
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of builds created by the scheduling engine
pub static BUILDS_CREATED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_builds_created_total"),
        "Total number of builds created by the scheduling engine",
    );
    let counter = Counter::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of builds deleted by history garbage collection
pub static BUILDS_GC_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_builds_gc_total"),
        "Total number of builds deleted by history garbage collection",
    );
    let counter = Counter::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Keychain cache lookups by outcome
///
/// Labels:
/// - `outcome`: `hit` or `miss`
pub static KEYCHAIN_CACHE_LOOKUPS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_keychain_cache_lookups_total"),
        "Keychain cache lookups by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a reconciliation outcome with its duration.
pub fn record_reconciliation(resource_type: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a build created by the scheduling engine.
pub fn record_build_created() {
    BUILDS_CREATED_TOTAL.inc();
}

/// Record a build deleted by history GC.
pub fn record_build_gc() {
    BUILDS_GC_TOTAL.inc();
}

/// Record a keychain cache hit.
pub fn record_keychain_cache_hit() {
    KEYCHAIN_CACHE_LOOKUPS_TOTAL
        .with_label_values(&["hit"])
        .inc();
}

/// Record a keychain cache miss.
pub fn record_keychain_cache_miss() {
    KEYCHAIN_CACHE_LOOKUPS_TOTAL
        .with_label_values(&["miss"])
        .inc();
}

/// Render all registered metrics in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if metric encoding fails.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
