//! # Package Installer Objects
//!
//! Typed mirrors of the operator lifecycle manager resources the operator reads and
//! writes. Only the fields the operator uses are modelled; the schemas are owned by the
//! package installer, so no CRDs are generated for them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const OLM_GROUP: &str = "operators.coreos.com";

/// Subscription to an operator package
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize)]
#[kube(
    kind = "Subscription",
    group = "operators.coreos.com",
    version = "v1alpha1",
    namespaced,
    status = "SubscriptionStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// Catalog source name
    pub source: String,
    pub source_namespace: String,
    /// Package name
    pub name: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub install_plan_approval: Option<Approval>,
    #[serde(default, rename = "startingCSV")]
    pub starting_csv: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    /// Newest CSV known to the catalog for this subscription
    #[serde(default, rename = "currentCSV")]
    pub current_csv: Option<String>,
    /// CSV currently installed
    #[serde(default, rename = "installedCSV")]
    pub installed_csv: Option<String>,
    /// Install plan created for the current CSV
    #[serde(default)]
    pub install_plan_ref: Option<InstallPlanReference>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlanReference {
    pub name: String,
    pub namespace: String,
}

/// Install plan approval strategy
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum Approval {
    Automatic,
    Manual,
}

/// Pending or applied set of operator resources
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize)]
#[kube(
    kind = "InstallPlan",
    group = "operators.coreos.com",
    version = "v1alpha1",
    namespaced,
    status = "InstallPlanStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlanSpec {
    #[serde(default)]
    pub cluster_service_version_names: Vec<String>,
    pub approval: Approval,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlanStatus {
    #[serde(default)]
    pub phase: InstallPlanPhase,
    #[serde(default)]
    pub plan: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum InstallPlanPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Planning,
    RequiresApproval,
    Installing,
    Complete,
    Failed,
    #[serde(other)]
    Unknown,
}

/// One resource of an install plan
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub resource: StepResource,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResource {
    pub kind: String,
    #[serde(default)]
    pub name: String,
    /// JSON manifest of the resource
    #[serde(default)]
    pub manifest: Option<String>,
}

/// Installed or installable operator version
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize)]
#[kube(
    kind = "ClusterServiceVersion",
    group = "operators.coreos.com",
    version = "v1alpha1",
    namespaced,
    status = "ClusterServiceVersionStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceVersionSpec {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub replaces: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceVersionStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Namespace scope an operator is allowed to watch
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize)]
#[kube(
    kind = "OperatorGroup",
    group = "operators.coreos.com",
    version = "v1",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroupSpec {
    #[serde(default)]
    pub target_namespaces: Vec<String>,
}

impl ClusterServiceVersion {
    pub fn is_failed(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|phase| phase == "Failed")
    }

    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.annotations.as_ref()
    }
}

impl InstallPlan {
    pub fn phase(&self) -> InstallPlanPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// The ClusterServiceVersion the plan will install
    ///
    /// While an upgrade is pending approval the new CSV only exists as a manifest
    /// embedded in the plan.
    pub fn embedded_csv(&self) -> Result<Option<ClusterServiceVersion>, serde_json::Error> {
        let Some(status) = &self.status else {
            return Ok(None);
        };
        let mut found = None;
        for step in &status.plan {
            if step.resource.kind == "ClusterServiceVersion" {
                if let Some(manifest) = &step.resource.manifest {
                    found = Some(serde_json::from_str(manifest)?);
                }
            }
        }
        Ok(found)
    }
}

impl Subscription {
    /// An upgrade is available when the newest known CSV is not the installed one
    pub fn has_pending_csv(&self) -> bool {
        let status = self.status.clone().unwrap_or_default();
        status.current_csv != status.installed_csv
    }

    pub fn install_plan_ref(&self) -> Option<&InstallPlanReference> {
        self.status.as_ref()?.install_plan_ref.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_manifest(manifest: &str) -> InstallPlan {
        let mut plan = InstallPlan::new(
            "install-abc",
            InstallPlanSpec {
                cluster_service_version_names: vec!["rhsso-operator.7.6.8".to_string()],
                approval: Approval::Manual,
                approved: false,
            },
        );
        plan.status = Some(InstallPlanStatus {
            phase: InstallPlanPhase::RequiresApproval,
            plan: vec![
                Step {
                    resource: StepResource {
                        kind: "ServiceAccount".to_string(),
                        name: "sa".to_string(),
                        manifest: Some("{}".to_string()),
                    },
                },
                Step {
                    resource: StepResource {
                        kind: "ClusterServiceVersion".to_string(),
                        name: "rhsso-operator.7.6.8".to_string(),
                        manifest: Some(manifest.to_string()),
                    },
                },
            ],
        });
        plan
    }

    #[test]
    fn test_embedded_csv_is_decoded() {
        let manifest = r#"{"apiVersion":"operators.coreos.com/v1alpha1","kind":"ClusterServiceVersion","metadata":{"name":"rhsso-operator.7.6.8","annotations":{"serviceAffecting":"false"}},"spec":{"version":"7.6.8"}}"#;
        let csv = plan_with_manifest(manifest).embedded_csv().unwrap().unwrap();
        assert_eq!(csv.spec.version.as_deref(), Some("7.6.8"));
        assert_eq!(
            csv.annotations().and_then(|a| a.get("serviceAffecting")).map(String::as_str),
            Some("false")
        );
    }

    #[test]
    fn test_embedded_csv_reports_bad_manifest() {
        assert!(plan_with_manifest("not json").embedded_csv().is_err());
    }

    #[test]
    fn test_unknown_install_plan_phase_deserializes() {
        let status: InstallPlanStatus =
            serde_json::from_value(serde_json::json!({"phase": "Replacing"})).unwrap();
        assert_eq!(status.phase, InstallPlanPhase::Unknown);
    }
}
