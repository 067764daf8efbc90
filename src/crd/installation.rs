//! # RHMI Installation
//!
//! The root desired-state record of a product suite installation and its status.

use super::names::{ProductName, StageName};
use super::phase::StatusPhase;
use crate::constants::{DEFAULT_PULL_SECRET_NAME, DEFAULT_PULL_SECRET_NAMESPACE};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// RHMI Custom Resource Definition
///
/// One RHMI object drives the whole suite. Its `type` selects the ordered install and
/// uninstall stages; deleting it walks the uninstall stages before the object goes away.
///
/// # Example
///
/// ```yaml
/// apiVersion: integreatly.org/v1alpha1
/// kind: RHMI
/// metadata:
///   name: rhoam
///   namespace: redhat-rhmi-operator
/// spec:
///   type: managed-api
///   namespacePrefix: redhat-rhoam-
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "RHMI",
    root = "Rhmi",
    group = "integreatly.org",
    version = "v1alpha1",
    namespaced,
    status = "RhmiStatus",
    shortname = "rhmi",
    printcolumn = r#"{"name":"Stage", "type":"string", "jsonPath":".status.stage"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"To Version", "type":"string", "jsonPath":".status.toVersion"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RhmiSpec {
    /// Installation flavor, selects the stage tables (e.g. "managed-api")
    #[serde(rename = "type")]
    pub installation_type: String,
    /// Prefix of every namespace the installation creates
    #[serde(default)]
    pub namespace_prefix: String,
    /// Cluster routing subdomain, discovered during bootstrap when unset
    #[serde(default)]
    pub routing_subdomain: Option<String>,
    /// Cluster console URL, discovered during bootstrap when unset
    #[serde(default, rename = "masterURL")]
    pub master_url: Option<String>,
    #[serde(default)]
    pub self_signed_certs: bool,
    /// Pull secret copied into the namespaces the installation creates
    #[serde(default)]
    pub pull_secret: Option<PullSecretSpec>,
}

/// Reference to the cluster pull secret
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullSecretSpec {
    pub name: String,
    pub namespace: String,
}

/// Status of the RHMI resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RhmiStatus {
    /// Stage name to stage status
    #[serde(default)]
    pub stages: BTreeMap<StageName, StageStatus>,
    /// Stage currently being reconciled, `complete` once done, `deletion` while removing
    #[serde(default)]
    pub stage: Option<StageName>,
    /// Most recent failure, cleared by the next fully successful pass
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub preflight_status: Option<PreflightStatus>,
    #[serde(default)]
    pub preflight_message: Option<String>,
    /// Suite version currently installed
    #[serde(default)]
    pub version: Option<String>,
    /// Suite version being installed
    #[serde(default)]
    pub to_version: Option<String>,
}

/// Result of the checks run before the first install pass
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PreflightStatus {
    Successful,
    Failed,
}

/// Status of one stage
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageStatus {
    pub name: StageName,
    pub phase: StatusPhase,
    #[serde(default)]
    pub products: BTreeMap<ProductName, ProductStatus>,
}

/// Status of one product within a stage
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatus {
    pub name: ProductName,
    /// Installed product version
    #[serde(default)]
    pub version: String,
    /// Installed operator version
    #[serde(default, rename = "operator")]
    pub operator_version: String,
    /// Externally reachable host
    #[serde(default)]
    pub host: String,
    #[serde(rename = "status")]
    pub phase: StatusPhase,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl ProductStatus {
    /// Placeholder used by the stage tables before a product first runs
    pub fn new(name: ProductName) -> Self {
        Self {
            name,
            version: String::new(),
            operator_version: String::new(),
            host: String::new(),
            phase: StatusPhase::None,
            last_error: None,
        }
    }
}

impl Rhmi {
    /// Pull secret reference, falling back to the cluster-wide default
    pub fn pull_secret_ref(&self) -> PullSecretSpec {
        self.spec
            .pull_secret
            .clone()
            .filter(|s| !s.name.is_empty() && !s.namespace.is_empty())
            .unwrap_or_else(|| PullSecretSpec {
                name: DEFAULT_PULL_SECRET_NAME.to_string(),
                namespace: DEFAULT_PULL_SECRET_NAMESPACE.to_string(),
            })
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Current stage status of a product, wherever it sits
    pub fn product_status(&self, product: ProductName) -> Option<&ProductStatus> {
        self.status
            .as_ref()?
            .stages
            .values()
            .find_map(|stage| stage.products.get(&product))
    }
}
