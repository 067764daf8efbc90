//! # Preflight Checks
//!
//! Refuse to install over an existing deployment of any product in the suite: a
//! subscription to one of the suite's packages outside the installation's own namespaces
//! blocks the installation until it is removed.

use super::types::InstallationType;
use crate::cluster::typed;
use crate::cluster::{ClusterClient, ClusterError, Labels};
use crate::crd::{ProductName, Rhmi};
use crate::olm::Subscription;
use crate::products::declaration;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

const IGNORED_PREFIXES: [&str; 2] = ["openshift-", "kube-"];

/// Result of one preflight run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightOutcome {
    pub passed: bool,
    pub message: String,
}

impl PreflightOutcome {
    fn passed() -> Self {
        Self {
            passed: true,
            message: "preflight checks passed".to_string(),
        }
    }

    fn conflict(namespace: &str, products: &[ProductName]) -> Self {
        let names: Vec<&str> = products.iter().map(|p| p.as_str()).collect();
        Self {
            passed: false,
            message: format!(
                "found conflicting packages: {}, in namespace: {namespace}",
                names.join(", ")
            ),
        }
    }
}

fn is_ignored(namespace: &str, installation: &Rhmi) -> bool {
    IGNORED_PREFIXES.iter().any(|p| namespace.starts_with(p))
        || (!installation.spec.namespace_prefix.is_empty()
            && namespace.starts_with(&installation.spec.namespace_prefix))
        || installation.namespace().as_deref() == Some(namespace)
}

/// Look for subscriptions to the packages of `installation_type` in foreign namespaces
///
/// Listing errors are returned so the checks run again on the next pass.
pub async fn run_preflight_checks(
    client: &dyn ClusterClient,
    installation: &Rhmi,
    installation_type: &InstallationType,
) -> Result<PreflightOutcome, ClusterError> {
    let packages: Vec<(ProductName, &str)> = installation_type
        .products()
        .into_iter()
        .filter_map(|product| {
            declaration(product)
                .operator
                .map(|operator| (product, operator.package))
        })
        .collect();

    let subscriptions = typed::list::<Subscription>(client, None, &Labels::new()).await?;
    let mut conflicts: BTreeMap<String, Vec<ProductName>> = BTreeMap::new();
    for subscription in &subscriptions {
        let Some(namespace) = subscription.namespace() else {
            continue;
        };
        if is_ignored(&namespace, installation) {
            continue;
        }
        for (product, package) in &packages {
            if subscription.spec.name == *package || subscription.name_any() == *package {
                debug!(%product, %namespace, "Found conflicting subscription");
                let found = conflicts.entry(namespace.clone()).or_default();
                if !found.contains(product) {
                    found.push(*product);
                }
            }
        }
    }

    match conflicts.into_iter().next() {
        Some((namespace, mut products)) => {
            products.sort();
            let outcome = PreflightOutcome::conflict(&namespace, &products);
            info!(message = %outcome.message, "Preflight checks failed");
            Ok(outcome)
        }
        None => Ok(PreflightOutcome::passed()),
    }
}
