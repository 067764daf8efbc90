//! # Upgrade Schedule
//!
//! Pure calculations over an `RHMIConfig` and the install plan of a pending upgrade.
//! Every function takes the current time as an argument so callers (and tests) decide
//! what "now" is.
//!
//! All times are UTC. A weekly window is written `"<day> HH:MM"` with `day` one of
//! `sun`..`sat` (case-insensitive); it starts on the next occurrence of that weekday,
//! counting today, at the given time.

use super::error::ScheduleError;
use crate::constants::{
    ANNOTATION_SERVICE_AFFECTING, UPGRADE_DEADLINE_DAYS, UPGRADE_WINDOW_HOURS,
    UPGRADE_WINDOW_MARGIN_HOURS,
};
use crate::crd::{
    RhmiConfig, UpgradeSchedule, UpgradeScheduleCalculation, DATE_DISPLAY_FORMAT, DATE_FORMAT,
    STATUS_DATE_DISPLAY_FORMAT, STATUS_DATE_FORMAT, WINDOW_DATE_FORMAT,
};
use crate::olm::{ClusterServiceVersion, InstallPlan, Subscription};
use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use regex::Regex;
use std::str::FromStr;

/// Day names in `num_days_from_sunday` order
pub const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Parsed `"<day> HH:MM"` weekly start time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyTime {
    days_from_sunday: u32,
    time: NaiveTime,
}

impl WeeklyTime {
    pub fn time(&self) -> NaiveTime {
        self.time
    }
}

impl FromStr for WeeklyTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pattern = Regex::new(r"^(?P<day>[a-z]{3}) (?P<time>\d{1,2}:\d{2})$")?;
        let lower = s.trim().to_lowercase();
        let invalid = || ScheduleError::InvalidWeeklyWindow(s.to_string());

        let captures = pattern.captures(&lower).ok_or_else(invalid)?;
        let day = captures.name("day").ok_or_else(invalid)?.as_str();
        let days_from_sunday = WEEKDAYS
            .iter()
            .position(|d| *d == day)
            .ok_or_else(invalid)?;
        let time = parse_clock(captures.name("time").ok_or_else(invalid)?.as_str())
            .ok_or_else(invalid)?;

        Ok(Self {
            days_from_sunday: u32::try_from(days_from_sunday).map_err(|_| invalid())?,
            time,
        })
    }
}

/// Parse `"HH:MM"`
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Parse `spec.upgrade.applyOn` / `status.upgrade.scheduled.for`, e.g. `"2 Jan 2006 15:04"`
pub fn parse_apply_on(s: &str) -> Result<DateTime<Utc>, ScheduleError> {
    NaiveDateTime::parse_from_str(s.trim(), DATE_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| ScheduleError::InvalidApplyOn(s.to_string()))
}

/// Parse `status.maintenance.applyFrom`, e.g. `"2-1-2006 15:04"`
pub fn parse_status_date(s: &str) -> Result<DateTime<Utc>, ScheduleError> {
    NaiveDateTime::parse_from_str(s.trim(), STATUS_DATE_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| ScheduleError::InvalidStatusDate(s.to_string()))
}

/// Parse `status.maintenance.duration`, e.g. `"6hrs"`
pub fn parse_duration_hours(s: &str) -> Result<i64, ScheduleError> {
    s.trim()
        .strip_suffix("hrs")
        .and_then(|hours| hours.parse().ok())
        .ok_or_else(|| ScheduleError::InvalidDuration(s.to_string()))
}

/// True iff the package installer knows a newer CSV than the installed one
pub fn is_upgrade_available(subscription: &Subscription) -> bool {
    subscription.has_pending_csv()
}

/// Upgrades are service affecting unless their CSV is annotated `serviceAffecting: "false"`
pub fn is_upgrade_service_affecting(csv: Option<&ClusterServiceVersion>) -> bool {
    let Some(csv) = csv else {
        return true;
    };
    csv.annotations()
        .and_then(|a| a.get(ANNOTATION_SERVICE_AFFECTING))
        .is_none_or(|value| value != "false")
}

/// Start and end of the weekly window described by `spec`, relative to `from`
///
/// The start is on the first day on or after `from`'s date whose weekday matches, so it
/// may lie earlier on the same day.
pub fn get_weekly_window(
    from: DateTime<Utc>,
    spec: &str,
    duration: TimeDelta,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ScheduleError> {
    let window: WeeklyTime = spec.parse()?;
    let mut day_diff =
        i64::from(window.days_from_sunday) - i64::from(from.weekday().num_days_from_sunday());
    if day_diff < 0 {
        day_diff += 7;
    }
    let start = from.date_naive().and_time(window.time).and_utc() + TimeDelta::days(day_diff);
    Ok((start, start + duration))
}


/// Whether a pending, service affecting upgrade may be approved at `now`
///
/// Upgrades are never approved in the last hour of a window.
pub fn can_upgrade_now(config: &RhmiConfig, now: DateTime<Utc>) -> Result<bool, ScheduleError> {
    let upgrade = &config.spec.upgrade;
    if upgrade.always_immediately {
        return Ok(true);
    }

    if upgrade.during_next_maintenance {
        let maintenance = config
            .status
            .as_ref()
            .map(|s| s.maintenance.clone())
            .unwrap_or_default();
        let Some(apply_from) = maintenance.apply_from.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(false);
        };
        let start = parse_status_date(apply_from)?;
        let hours = parse_duration_hours(maintenance.duration.as_deref().unwrap_or_default())?;
        let end = start + TimeDelta::hours(hours - UPGRADE_WINDOW_MARGIN_HOURS);
        return Ok(start <= now && now <= end);
    }

    if let Some(apply_on) = upgrade.apply_on.as_deref().filter(|s| !s.is_empty()) {
        let start = parse_apply_on(apply_on)?;
        let end = start + TimeDelta::hours(UPGRADE_WINDOW_HOURS - UPGRADE_WINDOW_MARGIN_HOURS);
        return Ok(start <= now && now < end);
    }

    Ok(false)
}

/// Creation time of an object, read through its serialized form
fn created_at(plan: &InstallPlan) -> Option<DateTime<Utc>> {
    let stamp = serde_json::to_value(plan.metadata.creation_timestamp.as_ref()?).ok()?;
    DateTime::parse_from_rfc3339(stamp.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Recompute the status of `config` for the pending upgrade in `install_plan`
///
/// Sets the next maintenance window, the period the upgrade must be applied in (cleared
/// once the plan is approved) and the time the upgrade is scheduled for.
pub fn update_status(
    config: &mut RhmiConfig,
    install_plan: &InstallPlan,
    now: DateTime<Utc>,
) -> Result<(), ScheduleError> {
    let mut status = config.status.clone().unwrap_or_default();
    let maintenance_from = config
        .spec
        .maintenance
        .apply_from
        .as_deref()
        .filter(|s| !s.is_empty());
    let window_length = TimeDelta::hours(UPGRADE_WINDOW_HOURS);

    if let Some(apply_from) = maintenance_from {
        let (start, _) = get_weekly_window(now, apply_from, window_length)?;
        status.maintenance.apply_from = Some(start.format(STATUS_DATE_DISPLAY_FORMAT).to_string());
        status.maintenance.duration = Some(format!("{UPGRADE_WINDOW_HOURS}hrs"));
    }

    let created = created_at(install_plan).unwrap_or(now);
    let deadline = created + TimeDelta::days(UPGRADE_DEADLINE_DAYS);
    status.upgrade.window = if install_plan.spec.approved {
        None
    } else {
        Some(format!(
            "{} - {}",
            created.format(WINDOW_DATE_FORMAT),
            deadline.format(WINDOW_DATE_FORMAT)
        ))
    };

    let upgrade = &config.spec.upgrade;
    status.upgrade.scheduled = if upgrade.always_immediately {
        None
    } else if upgrade.during_next_maintenance {
        match status.maintenance.apply_from.as_deref() {
            Some(apply_from) => Some(UpgradeSchedule {
                for_time: parse_status_date(apply_from)?
                    .format(DATE_DISPLAY_FORMAT)
                    .to_string(),
                calculated_from: UpgradeScheduleCalculation::NextMaintenance,
            }),
            None => None,
        }
    } else if let Some(apply_on) = upgrade.apply_on.as_deref().filter(|s| !s.is_empty()) {
        Some(UpgradeSchedule {
            for_time: apply_on.to_string(),
            calculated_from: UpgradeScheduleCalculation::ApplyOn,
        })
    } else {
        let (start, calculated_from) = match maintenance_from {
            Some(apply_from) => (
                get_weekly_window(deadline, apply_from, window_length)?.0,
                UpgradeScheduleCalculation::TwoWeeksMaintenanceWindow,
            ),
            None => (deadline, UpgradeScheduleCalculation::DefaultTwoWeeks),
        };
        Some(UpgradeSchedule {
            for_time: start.format(DATE_DISPLAY_FORMAT).to_string(),
            calculated_from,
        })
    };

    config.status = Some(status);
    Ok(())
}
