//! # Upgrade Scheduler
//!
//! Decides when a new version of the operator itself may be installed.
//!
//! - [`schedule`]: pure window and schedule calculations over an `RHMIConfig`
//! - [`validation`]: admission checks and defaults for `RHMIConfig` edits
//! - approval and the subscription controller that drives them

mod approval;
mod controller;
mod error;
pub mod schedule;
pub mod validation;

pub use approval::{approve_upgrade, record_approval};
pub use controller::{reconcile_subscription, UpgradeContext, UpgradeDecision};
pub use error::{ScheduleError, UpgradeError};
pub use schedule::{
    can_upgrade_now, get_weekly_window, is_upgrade_available, is_upgrade_service_affecting,
    update_status,
};
pub use validation::{apply_defaults, validate_backup_and_maintenance, validate_update};
