//! # Controller Metrics
//!
//! Metrics for installation reconciliation: passes, errors, requeues, and the phase of
//! every stage and product.

use crate::crd::{ProductName, StageName, StatusPhase};
use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGaugeVec};
use std::sync::LazyLock;

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "rhmi_reconciliations_total",
        "Total number of installation reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "rhmi_reconciliation_errors_total",
            "Total number of installation reconciliation errors",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "rhmi_reconciliation_duration_seconds",
            "Duration of installation reconciliation passes in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "rhmi_requeues_total",
            "Total number of reconciliation requeues",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static STAGE_PHASE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "rhmi_stage_phase",
            "1 for the current phase of each installation stage, 0 otherwise",
        ),
        &["stage", "phase"],
    )
    .expect("Failed to create STAGE_PHASE metric - this should never happen")
});

static PRODUCT_PHASE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "rhmi_product_phase",
            "1 for the current phase of each product, 0 otherwise",
        ),
        &["product", "phase"],
    )
    .expect("Failed to create PRODUCT_PHASE metric - this should never happen")
});

static VERSION_INFO: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "rhmi_version_info",
            "Current stage, installed version and target version of the installation",
        ),
        &["stage", "version", "to_version"],
    )
    .expect("Failed to create VERSION_INFO metric - this should never happen")
});

/// Register controller metrics with the registry
pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STAGE_PHASE.clone()))?;
    REGISTRY.register(Box::new(PRODUCT_PHASE.clone()))?;
    REGISTRY.register(Box::new(VERSION_INFO.clone()))?;
    Ok(())
}

// Public functions for controller metrics

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

fn set_phase(gauge: &IntGaugeVec, name: &str, phase: StatusPhase) {
    for candidate in StatusPhase::ALL {
        gauge
            .with_label_values(&[name, candidate.metric_label()])
            .set(i64::from(candidate == phase));
    }
}

pub fn set_stage_phase(stage: StageName, phase: StatusPhase) {
    set_phase(&STAGE_PHASE, stage.as_str(), phase);
}

pub fn set_product_phase(product: ProductName, phase: StatusPhase) {
    set_phase(&PRODUCT_PHASE, product.as_str(), phase);
}

/// Replace the version info series with the current one
pub fn set_version_info(stage: &str, version: &str, to_version: &str) {
    VERSION_INFO.reset();
    VERSION_INFO
        .with_label_values(&[stage, version, to_version])
        .set(1);
}
