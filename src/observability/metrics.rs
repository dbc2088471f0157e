//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `platform_admin_reconciliations_total` - Total number of reconcile passes
//! - `platform_admin_reconciliation_errors_total` - Passes that ended in an error
//! - `platform_admin_reconciliation_duration_seconds` - Duration of reconcile passes
//! - `platform_admin_requeues_total{reason}` - Requeues by reason (`not-ready`, `error-backoff`)
//! - `platform_admin_gc_failures_total{kind}` - Ownership GC failures by child kind
//! - `platform_admin_gc_collected_total{kind,action}` - Ownership GC actions (`released`, `deleted`)
//! - `platform_admin_ready_components{namespace,name}` - Ready components per PlatformAdmin
//! - `platform_admin_unready_components{namespace,name}` - Unready components per PlatformAdmin

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "platform_admin_reconciliations_total",
        "Total number of PlatformAdmin reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "platform_admin_reconciliation_errors_total",
        "Total number of PlatformAdmin reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "platform_admin_reconciliation_duration_seconds",
            "Duration of PlatformAdmin reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "platform_admin_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static GC_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "platform_admin_gc_failures_total",
            "Total number of ownership garbage collection failures by child kind",
        ),
        &["kind"],
    )
    .expect("Failed to create GC_FAILURES_TOTAL metric - this should never happen")
});

static GC_COLLECTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "platform_admin_gc_collected_total",
            "Total number of children released or deleted by ownership garbage collection",
        ),
        &["kind", "action"],
    )
    .expect("Failed to create GC_COLLECTED_TOTAL metric - this should never happen")
});

static READY_COMPONENTS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "platform_admin_ready_components",
            "Number of ready components per PlatformAdmin",
        ),
        &["namespace", "name"],
    )
    .expect("Failed to create READY_COMPONENTS metric - this should never happen")
});

static UNREADY_COMPONENTS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "platform_admin_unready_components",
            "Number of unready components per PlatformAdmin",
        ),
        &["namespace", "name"],
    )
    .expect("Failed to create UNREADY_COMPONENTS metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GC_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GC_COLLECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READY_COMPONENTS.clone()))?;
    REGISTRY.register(Box::new(UNREADY_COMPONENTS.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_gc_failures(kind: &str) {
    GC_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_gc_collected(kind: &str, action: &str) {
    GC_COLLECTED_TOTAL.with_label_values(&[kind, action]).inc();
}

#[must_use]
pub fn gc_failures(kind: &str) -> u64 {
    GC_FAILURES_TOTAL.with_label_values(&[kind]).get()
}

pub fn set_component_counts(namespace: &str, name: &str, ready: i32, unready: i32) {
    READY_COMPONENTS
        .with_label_values(&[namespace, name])
        .set(i64::from(ready));
    UNREADY_COMPONENTS
        .with_label_values(&[namespace, name])
        .set(i64::from(unready));
}

/// Drop the per-resource gauges once a PlatformAdmin is gone
pub fn forget_platform_admin(namespace: &str, name: &str) {
    // Absent label sets are not an error worth reporting
    let _ = READY_COMPONENTS.remove_label_values(&[namespace, name]);
    let _ = UNREADY_COMPONENTS.remove_label_values(&[namespace, name]);
}
