//! # Bootstrap Stage
//!
//! Runs before any product stage. Discovers the console URL and the routing subdomain
//! from the cluster console route, and copies the pull secret into the namespace the
//! installation lives in.

use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::crd::Rhmi;
use crate::products::ReconcileError;
use crate::resources::reconcile_pull_secret;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info};

pub const CONSOLE_ROUTE_NAME: &str = "console";
pub const CONSOLE_ROUTE_NAMESPACE: &str = "openshift-console";
const ROUTER_PREFIX: &str = "router-default.";

pub fn route_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("route.openshift.io", "v1", "Route"),
        "routes",
    )
}

/// Host and router hostname published by the console route
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConsoleIngress {
    host: String,
    router_canonical_hostname: String,
}

impl ConsoleIngress {
    fn from_route(route: &DynamicObject) -> Option<Self> {
        let ingress = route.data.pointer("/status/ingress/0")?;
        Some(Self {
            host: ingress.get("host")?.as_str()?.to_string(),
            router_canonical_hostname: ingress
                .get("routerCanonicalHostname")
                .and_then(|h| h.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn routing_subdomain(&self) -> &str {
        self.router_canonical_hostname
            .strip_prefix(ROUTER_PREFIX)
            .unwrap_or(&self.router_canonical_hostname)
    }
}

async fn console_ingress(
    client: &dyn ClusterClient,
    timeout: Duration,
) -> Result<ConsoleIngress, ReconcileError> {
    let resource = route_resource();
    let lookup = client.get(&resource, Some(CONSOLE_ROUTE_NAMESPACE), CONSOLE_ROUTE_NAME);
    let route = match tokio::time::timeout(timeout, lookup).await {
        Err(_) => return Err(ClusterError::Timeout(timeout.as_secs()).into()),
        Ok(Err(e)) if e.is_not_found() => {
            return Err(ReconcileError::Failed(format!(
                "could not find console route: {e}"
            )))
        }
        Ok(result) => result?,
    };
    ConsoleIngress::from_route(&route).ok_or_else(|| {
        ReconcileError::Failed("console route has no ingress host".to_string())
    })
}

/// Run the bootstrap stage once, returning the installation as it is stored afterwards
///
/// The console host always replaces `masterURL`; the routing subdomain is only filled
/// in when unset, so a user-chosen subdomain is kept.
pub async fn reconcile_bootstrap(
    client: &dyn ClusterClient,
    installation: &Rhmi,
    retries: u32,
    timeout: Duration,
) -> Result<Rhmi, ReconcileError> {
    let ingress = console_ingress(client, timeout).await?;
    debug!(host = %ingress.host, "Found console route");

    let name = installation.name_any();
    let namespace = installation.namespace();
    let updated = typed::modify::<Rhmi, _>(
        client,
        namespace.as_deref(),
        &name,
        Subresource::Main,
        retries,
        |rhmi| {
            let mut changed = false;
            if rhmi.spec.master_url.as_deref() != Some(ingress.host.as_str()) {
                rhmi.spec.master_url = Some(ingress.host.clone());
                changed = true;
            }
            if rhmi.spec.routing_subdomain.as_deref().unwrap_or_default().is_empty()
                && !ingress.routing_subdomain().is_empty()
            {
                rhmi.spec.routing_subdomain = Some(ingress.routing_subdomain().to_string());
                changed = true;
            }
            changed
        },
    )
    .await?;
    let updated = updated.unwrap_or_else(|| installation.clone());
    if updated.spec.routing_subdomain != installation.spec.routing_subdomain {
        info!(
            installation = %name,
            subdomain = updated.spec.routing_subdomain.as_deref().unwrap_or_default(),
            "Discovered routing subdomain"
        );
    }

    if let Some(namespace) = namespace.as_deref() {
        reconcile_pull_secret(client, &updated, namespace, retries).await?;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RhmiSpec;

    #[test]
    fn test_console_ingress_from_route() {
        let mut route = DynamicObject::new(CONSOLE_ROUTE_NAME, &route_resource());
        route.data = serde_json::json!({
            "status": {"ingress": [{
                "host": "console-openshift-console.apps.example.com",
                "routerCanonicalHostname": "router-default.apps.example.com"
            }]}
        });
        let ingress = ConsoleIngress::from_route(&route).unwrap();
        assert_eq!(ingress.host, "console-openshift-console.apps.example.com");
        assert_eq!(ingress.routing_subdomain(), "apps.example.com");
    }

    #[test]
    fn test_route_without_ingress() {
        let route = DynamicObject::new(CONSOLE_ROUTE_NAME, &route_resource());
        assert!(ConsoleIngress::from_route(&route).is_none());
    }

    #[tokio::test]
    async fn test_missing_route_fails() {
        let cluster = crate::cluster::InMemoryCluster::new();
        let mut rhmi = Rhmi::new(
            "rhoam",
            RhmiSpec {
                installation_type: "managed-api".to_string(),
                namespace_prefix: "redhat-rhoam-".to_string(),
                routing_subdomain: None,
                master_url: None,
                self_signed_certs: false,
                pull_secret: None,
            },
        );
        rhmi.metadata.namespace = Some("redhat-rhmi-operator".to_string());
        cluster.seed(&rhmi).unwrap();
        let err = reconcile_bootstrap(&cluster, &rhmi, 3, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("could not find console route"));
    }
}
