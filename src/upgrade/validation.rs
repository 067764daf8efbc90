//! # Upgrade Schedule Admission
//!
//! Checks and defaults applied to `RHMIConfig` edits before they are stored.
//!
//! Backup and maintenance times are each treated as a one hour window and may not
//! overlap; only the time of day of the maintenance window is compared.

use super::error::ScheduleError;
use super::schedule::{parse_apply_on, parse_clock, WeeklyTime};
use crate::constants::{
    ANNOTATION_LAST_EDIT_TIMESTAMP, ANNOTATION_LAST_EDIT_USERNAME, DEFAULT_BACKUP_APPLY_ON,
    DEFAULT_MAINTENANCE_APPLY_FROM, OPERATOR_SERVICE_ACCOUNT,
};
use crate::crd::{RhmiConfig, DATE_DISPLAY_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn one_hour_from(start: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    (start, start + TimeDelta::hours(1))
}

fn describe((start, end): (NaiveDateTime, NaiveDateTime)) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

/// `(startA <= endB) && (endA >= startB)`
fn overlaps(a: (NaiveDateTime, NaiveDateTime), b: (NaiveDateTime, NaiveDateTime)) -> bool {
    a.0 <= b.1 && a.1 >= b.0
}

/// Validate the backup and maintenance times, returning them with defaults applied
pub fn validate_backup_and_maintenance(
    backup_apply_on: Option<&str>,
    maintenance_apply_from: Option<&str>,
) -> Result<(String, String), ScheduleError> {
    let backup = non_empty(backup_apply_on).unwrap_or(DEFAULT_BACKUP_APPLY_ON);
    let maintenance = non_empty(maintenance_apply_from).unwrap_or(DEFAULT_MAINTENANCE_APPLY_FROM);

    let backup_time =
        parse_clock(backup).ok_or_else(|| ScheduleError::InvalidBackupTime(backup.to_string()))?;
    let maintenance_time = maintenance.parse::<WeeklyTime>()?.time();

    // Both on the same reference day so a window past midnight ends on the next day
    let day = NaiveDate::default();
    let backup_window = one_hour_from(day.and_time(backup_time));
    let maintenance_window = one_hour_from(day.and_time(maintenance_time));
    if overlaps(backup_window, maintenance_window) {
        return Err(ScheduleError::Overlap {
            backup: describe(backup_window),
            maintenance: describe(maintenance_window),
        });
    }
    Ok((backup.to_string(), maintenance.to_string()))
}

/// Reject an `RHMIConfig` update that would leave the schedule invalid
pub fn validate_update(config: &RhmiConfig, now: DateTime<Utc>) -> Result<(), ScheduleError> {
    let spec = &config.spec;
    validate_backup_and_maintenance(
        spec.backup.apply_on.as_deref(),
        spec.maintenance.apply_from.as_deref(),
    )?;

    let Some(apply_on) = non_empty(spec.upgrade.apply_on.as_deref()) else {
        return Ok(());
    };
    if spec.upgrade.always_immediately || spec.upgrade.during_next_maintenance {
        return Err(ScheduleError::ConflictingPolicies);
    }
    let apply_on = parse_apply_on(apply_on)?;
    if apply_on <= now {
        return Err(ScheduleError::ApplyOnNotInFuture(
            apply_on.format(DATE_DISPLAY_FORMAT).to_string(),
        ));
    }
    Ok(())
}

/// Fill in default backup and maintenance times and record who last edited `config`
///
/// Edits made by the operator's own service account are not recorded.
pub fn apply_defaults(config: &mut RhmiConfig, username: &str, now: DateTime<Utc>) {
    if username != OPERATOR_SERVICE_ACCOUNT {
        let annotations = config.metadata.annotations.get_or_insert_with(Default::default);
        annotations.insert(
            ANNOTATION_LAST_EDIT_USERNAME.to_string(),
            username.to_string(),
        );
        annotations.insert(
            ANNOTATION_LAST_EDIT_TIMESTAMP.to_string(),
            now.format(DATE_DISPLAY_FORMAT).to_string(),
        );
    }

    let spec = &mut config.spec;
    if non_empty(spec.maintenance.apply_from.as_deref()).is_none() {
        spec.maintenance.apply_from = Some(DEFAULT_MAINTENANCE_APPLY_FROM.to_string());
    }
    if non_empty(spec.backup.apply_on.as_deref()).is_none() {
        spec.backup.apply_on = Some(DEFAULT_BACKUP_APPLY_ON.to_string());
    }
}
