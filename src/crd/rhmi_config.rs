//! # RHMIConfig
//!
//! User-editable upgrade schedule: upgrade policy, weekly maintenance window and daily
//! backup time.

use serde::{Deserialize, Serialize};

/// Date format of `spec.upgrade.applyOn` and `status.upgrade.scheduled.for` (parsing)
pub const DATE_FORMAT: &str = "%d %b %Y %H:%M";
/// Date format of `spec.upgrade.applyOn` and `status.upgrade.scheduled.for` (rendering)
pub const DATE_DISPLAY_FORMAT: &str = "%-d %b %Y %H:%M";
/// Format of `status.maintenance.applyFrom` (parsing)
pub const STATUS_DATE_FORMAT: &str = "%d-%m-%Y %H:%M";
/// Format of `status.maintenance.applyFrom` (rendering)
pub const STATUS_DATE_DISPLAY_FORMAT: &str = "%-d-%-m-%Y %H:%M";
/// Format of each side of `status.upgrade.window`
pub const WINDOW_DATE_FORMAT: &str = "%-d %b %Y";

/// RHMIConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: integreatly.org/v1alpha1
/// kind: RHMIConfig
/// metadata:
///   name: rhmi-config
///   namespace: redhat-rhmi-operator
/// spec:
///   upgrade:
///     duringNextMaintenance: true
///   maintenance:
///     applyFrom: "sun 23:00"
///   backup:
///     applyOn: "03:01"
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "RHMIConfig",
    root = "RhmiConfig",
    group = "integreatly.org",
    version = "v1alpha1",
    namespaced,
    status = "RhmiConfigStatus",
    shortname = "rhmiconfig",
    printcolumn = r#"{"name":"Maintenance", "type":"string", "jsonPath":".status.maintenance.applyFrom"}"#,
    printcolumn = r#"{"name":"Upgrade Window", "type":"string", "jsonPath":".status.upgrade.window"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RhmiConfigSpec {
    #[serde(default)]
    pub upgrade: Upgrade,
    #[serde(default)]
    pub maintenance: Maintenance,
    #[serde(default)]
    pub backup: Backup,
}

/// Upgrade policy
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Upgrade {
    /// Comma separated list of people notified about upgrades
    #[serde(default)]
    pub contacts: Option<String>,
    /// Approve every upgrade as soon as it is available
    #[serde(default)]
    pub always_immediately: bool,
    /// Approve upgrades during the next maintenance window
    #[serde(default)]
    pub during_next_maintenance: bool,
    /// Approve upgrades at this time, format "2 Jan 2006 15:04"
    #[serde(default)]
    pub apply_on: Option<String>,
}

/// Weekly maintenance window
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    /// Window start, format "<day> HH:MM" in UTC, e.g. "sun 23:00"
    #[serde(default)]
    pub apply_from: Option<String>,
}

/// Daily backup
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Backup time, format "HH:MM" in UTC
    #[serde(default)]
    pub apply_on: Option<String>,
}

/// Status of the RHMIConfig resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RhmiConfigStatus {
    #[serde(default)]
    pub maintenance: StatusMaintenance,
    #[serde(default)]
    pub upgrade: StatusUpgrade,
}

/// Next absolute maintenance window
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusMaintenance {
    /// Window start, format "2-1-2006 15:04"
    #[serde(default)]
    pub apply_from: Option<String>,
    /// Window length, format "<N>hrs"
    #[serde(default)]
    pub duration: Option<String>,
}

/// Pending upgrade details
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpgrade {
    /// Period in which the pending upgrade must be applied, "<date> - <date>"
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub scheduled: Option<UpgradeSchedule>,
}

/// When the pending upgrade is expected to be approved
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeSchedule {
    /// Format "2 Jan 2006 15:04"
    #[serde(rename = "for")]
    pub for_time: String,
    pub calculated_from: UpgradeScheduleCalculation,
}

/// Which policy produced an [`UpgradeSchedule`]
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum UpgradeScheduleCalculation {
    DefaultTwoWeeks,
    TwoWeeksMaintenanceWindow,
    NextMaintenance,
    ApplyOn,
}
