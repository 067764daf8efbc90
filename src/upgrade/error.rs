//! # Upgrade Errors

use crate::cluster::ClusterError;
use thiserror::Error;

/// Upgrade schedule could not be parsed or is invalid
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to parse weekly window {0:?}: expected format `DDD HH:mm`")]
    InvalidWeeklyWindow(String),
    #[error("failed to parse backup applyOn value {0:?}: expected format HH:mm")]
    InvalidBackupTime(String),
    #[error("invalid value for spec.upgrade.applyOn {0:?}, must be a date with the format \"2 Jan 2006 15:04\"")]
    InvalidApplyOn(String),
    #[error("invalid value for spec.upgrade.applyOn: {0}. It must be a future date")]
    ApplyOnNotInFuture(String),
    #[error("spec.upgrade.applyOn shouldn't be set when spec.upgrade.alwaysImmediately or spec.upgrade.duringNextMaintenance are true")]
    ConflictingPolicies,
    #[error("backup and maintenance times cannot overlap, each time is parsed as a 1 hour window, current backup applyOn window : {backup} overlaps with current maintenance window : {maintenance}")]
    Overlap { backup: String, maintenance: String },
    #[error("invalid maintenance duration {0:?}: expected format `<N>hrs`")]
    InvalidDuration(String),
    #[error("invalid status date {0:?}")]
    InvalidStatusDate(String),
    #[error("invalid schedule pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ScheduleError {
    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleError::InvalidWeeklyWindow(_) => "invalid_weekly_window",
            ScheduleError::InvalidBackupTime(_) => "invalid_backup_time",
            ScheduleError::InvalidApplyOn(_) => "invalid_apply_on",
            ScheduleError::ApplyOnNotInFuture(_) => "apply_on_not_in_future",
            ScheduleError::ConflictingPolicies => "conflicting_policies",
            ScheduleError::Overlap { .. } => "overlap",
            ScheduleError::InvalidDuration(_) => "invalid_duration",
            ScheduleError::InvalidStatusDate(_) => "invalid_status_date",
            ScheduleError::Pattern(_) => "pattern",
        }
    }
}

/// Error surfaced by one upgrade evaluation
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("installplan not found in the subscription status reference")]
    MissingInstallPlanRef,
    #[error("failed to read the ClusterServiceVersion embedded in install plan {plan}: {source}")]
    EmbeddedCsv {
        plan: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UpgradeError {
    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeError::Cluster(e) => e.as_str(),
            UpgradeError::Schedule(e) => e.as_str(),
            UpgradeError::MissingInstallPlanRef => "missing_install_plan_ref",
            UpgradeError::EmbeddedCsv { .. } => "embedded_csv",
        }
    }
}
