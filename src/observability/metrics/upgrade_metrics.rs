//! # Upgrade Metrics

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec};
use std::sync::LazyLock;

static UPGRADE_APPROVALS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "rhmi_upgrade_approvals_total",
        "Total number of install plans approved by the operator",
    )
    .expect("Failed to create UPGRADE_APPROVALS_TOTAL metric - this should never happen")
});

static UPGRADE_DECISIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "rhmi_upgrade_decisions_total",
            "Outcome of each pending upgrade evaluation",
        ),
        &["decision"],
    )
    .expect("Failed to create UPGRADE_DECISIONS_TOTAL metric - this should never happen")
});

pub(crate) fn register_upgrade_metrics() -> Result<()> {
    REGISTRY.register(Box::new(UPGRADE_APPROVALS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPGRADE_DECISIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_upgrade_approvals() {
    UPGRADE_APPROVALS_TOTAL.inc();
}

/// `decision` is one of `approved`, `waiting` or `none`
pub fn increment_upgrade_decisions(decision: &str) {
    UPGRADE_DECISIONS_TOTAL.with_label_values(&[decision]).inc();
}
