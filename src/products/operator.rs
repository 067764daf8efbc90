//! # Operator-Backed Product Reconciler
//!
//! The reconciler shared by products installed through an operator package: hold the
//! product finalizer, create the operator namespace, subscribe to the package, create
//! the product namespace and record what was installed. Products without a package
//! skip the operator steps.

use super::declaration::ProductDeclaration;
use super::error::ReconcileError;
use super::{ProductConstructor, ProductContext, ProductReconciler};
use crate::cluster::events::reference_for;
use crate::cluster::ClusterClient;
use crate::config_store::ProductConfig;
use crate::constants::EVENT_PROCESSING_ERROR;
use crate::crd::{ProductName, ProductStatus, Rhmi, StatusPhase};
use crate::marketplace::Target;
use crate::resources::{
    delete_namespace, reconcile_finalizer, reconcile_namespace, reconcile_pull_secret,
    reconcile_subscription,
};
use async_trait::async_trait;
use kube::runtime::events::EventType;
use regex::Regex;
use tracing::{debug, info};

/// Builds an [`OperatorProductReconciler`] from the product's stored configuration
#[derive(Debug, Clone)]
pub struct OperatorProductConstructor {
    declaration: ProductDeclaration,
}

impl OperatorProductConstructor {
    pub fn new(declaration: ProductDeclaration) -> Self {
        Self { declaration }
    }
}

/// Namespace names must be RFC 1123 labels
fn validate_namespace(product: ProductName, namespace: &str) -> Result<(), ReconcileError> {
    let invalid = |message: String| ReconcileError::InvalidConfig { product, message };
    if namespace.len() > 63 {
        return Err(invalid(format!(
            "namespace '{namespace}' exceeds maximum length of 63 characters"
        )));
    }
    let namespace_regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$")
        .map_err(|e| invalid(format!("failed to compile regex: {e}")))?;
    if !namespace_regex.is_match(namespace) {
        return Err(invalid(format!(
            "namespace '{namespace}' must be lowercase alphanumeric or hyphens, not starting or ending with a hyphen"
        )));
    }
    Ok(())
}

#[async_trait]
impl ProductConstructor for OperatorProductConstructor {
    async fn build(
        &self,
        installation: &Rhmi,
        context: &ProductContext,
    ) -> Result<Box<dyn ProductReconciler>, ReconcileError> {
        let product = self.declaration.product;
        let mut config = context.config_manager.read_product(product).await?;
        if config.namespace().is_none() {
            config.set_namespace(format!(
                "{}{}",
                installation.spec.namespace_prefix, self.declaration.namespace_suffix
            ));
        }
        let namespace = config.namespace().unwrap_or_default().to_string();
        validate_namespace(product, &namespace)?;

        if self.declaration.operator.is_some() {
            if config.operator_namespace().is_none() {
                config.set_operator_namespace(format!("{namespace}-operator"));
            }
            validate_namespace(product, config.operator_namespace().unwrap_or_default())?;
        }

        Ok(Box::new(OperatorProductReconciler {
            declaration: self.declaration,
            config,
            context: context.clone(),
        }))
    }
}

pub struct OperatorProductReconciler {
    declaration: ProductDeclaration,
    config: ProductConfig,
    context: ProductContext,
}

impl OperatorProductReconciler {
    pub fn config(&self) -> &ProductConfig {
        &self.config
    }

    fn namespace(&self) -> &str {
        self.config.namespace().unwrap_or_default()
    }

    /// Operator namespace, `None` for products without a package
    fn operator_namespace(&self) -> Option<&str> {
        self.declaration.operator?;
        self.config.operator_namespace()
    }

    /// Every namespace the product owns, product namespace first
    fn namespaces(&self) -> Vec<String> {
        let mut namespaces = vec![self.namespace().to_string()];
        if let Some(operator_namespace) = self.operator_namespace() {
            if operator_namespace != self.namespace() {
                namespaces.push(operator_namespace.to_string());
            }
        }
        namespaces
    }

    async fn remove_namespaces(
        &self,
        client: &dyn ClusterClient,
        namespaces: &[String],
    ) -> Result<StatusPhase, ReconcileError> {
        let mut phase = StatusPhase::Completed;
        for namespace in namespaces {
            if !delete_namespace(client, namespace).await?.is_completed() {
                phase = StatusPhase::InProgress;
            }
        }
        Ok(phase)
    }

    async fn reconcile_operator(
        &self,
        installation: &Rhmi,
        client: &dyn ClusterClient,
    ) -> Result<StatusPhase, ReconcileError> {
        let (Some(package), Some(operator_namespace)) =
            (self.declaration.operator, self.operator_namespace())
        else {
            return Ok(StatusPhase::Completed);
        };
        let retries = self.context.retries;

        let phase = reconcile_namespace(client, operator_namespace, installation, retries).await?;
        if !phase.is_completed() {
            return Ok(phase);
        }
        reconcile_pull_secret(client, installation, operator_namespace, retries).await?;

        let target = Target::new(package.package, package.channel, operator_namespace);
        match reconcile_subscription(client, &*self.context.installer, &target, retries).await {
            Ok(phase) => Ok(phase),
            Err(e) => {
                self.context
                    .recorder
                    .publish(
                        &reference_for(installation),
                        EventType::Warning,
                        EVENT_PROCESSING_ERROR,
                        format!("Failed to reconcile {} subscription: {e}", package.package),
                    )
                    .await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ProductReconciler for OperatorProductReconciler {
    fn product(&self) -> ProductName {
        self.declaration.product
    }

    fn verify_version(&self, installation: &Rhmi) -> bool {
        self.declaration
            .verify_version(installation.product_status(self.declaration.product))
    }

    async fn reconcile(
        &self,
        installation: &Rhmi,
        status: &mut ProductStatus,
        client: &dyn ClusterClient,
    ) -> Result<StatusPhase, ReconcileError> {
        let product = self.declaration.product;
        let retries = self.context.retries;
        let namespaces = self.namespaces();

        let phase = reconcile_finalizer(
            client,
            installation,
            &product.finalizer(),
            retries,
            || self.remove_namespaces(client, &namespaces),
        )
        .await?;
        if installation.is_being_deleted() || !phase.is_completed() {
            return Ok(phase);
        }

        let phase = self.reconcile_operator(installation, client).await?;
        if !phase.is_completed() {
            debug!(%product, phase = %phase, "Waiting for operator");
            return Ok(phase);
        }

        if self.operator_namespace() != Some(self.namespace()) {
            let phase = reconcile_namespace(client, self.namespace(), installation, retries).await?;
            if !phase.is_completed() {
                return Ok(phase);
            }
            reconcile_pull_secret(client, installation, self.namespace(), retries).await?;
        }

        let host = installation
            .spec
            .routing_subdomain
            .as_deref()
            .filter(|d| !d.is_empty())
            .and_then(|domain| self.declaration.host.host(self.namespace(), domain));

        let mut config = self.config.clone();
        config.set_version(self.declaration.version);
        if !self.declaration.operator_version.is_empty() {
            config.set_operator_version(self.declaration.operator_version);
        }
        if let Some(host) = &host {
            config.set_host(host.clone());
        }
        self.context.config_manager.write_config(&config).await?;

        if status.version != self.declaration.version {
            info!(%product, version = self.declaration.version, "Product installed");
        }
        status.version = self.declaration.version.to_string();
        status.operator_version = self.declaration.operator_version.to_string();
        status.host = host.unwrap_or_default();
        Ok(StatusPhase::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::typed;
    use crate::cluster::{InMemoryCluster, MemoryRecorder, Verb};
    use crate::config_store::ConfigManager;
    use crate::crd::RhmiSpec;
    use crate::marketplace::MarketplaceManager;
    use crate::olm::Subscription;
    use crate::products::declaration;
    use k8s_openapi::api::core::v1::Namespace;
    use kube::api::ObjectMeta;
    use kube::ResourceExt;
    use std::sync::Arc;

    const OPERATOR_NAMESPACE: &str = "redhat-rhmi-operator";

    fn installation() -> Rhmi {
        let mut rhmi = Rhmi::new(
            "rhoam",
            RhmiSpec {
                installation_type: "managed-api".to_string(),
                namespace_prefix: "redhat-rhoam-".to_string(),
                routing_subdomain: Some("apps.example.com".to_string()),
                master_url: None,
                self_signed_certs: false,
                pull_secret: None,
            },
        );
        rhmi.metadata.namespace = Some(OPERATOR_NAMESPACE.to_string());
        rhmi
    }

    fn context(cluster: &Arc<InMemoryCluster>) -> ProductContext {
        let client: Arc<dyn ClusterClient> = cluster.clone();
        ProductContext {
            config_manager: ConfigManager::new(
                client.clone(),
                OPERATOR_NAMESPACE,
                "installation-config",
                3,
            ),
            client,
            installer: Arc::new(MarketplaceManager::new()),
            recorder: Arc::new(MemoryRecorder::new()),
            retries: 3,
        }
    }

    fn stored(cluster: &InMemoryCluster) -> Option<Rhmi> {
        cluster.object(Some(OPERATOR_NAMESPACE), "rhoam")
    }

    async fn reconcile_once(
        cluster: &Arc<InMemoryCluster>,
        product: ProductName,
    ) -> (StatusPhase, ProductStatus) {
        let rhmi = stored(cluster).unwrap();
        let reconciler = OperatorProductConstructor::new(*declaration(product))
            .build(&rhmi, &context(cluster))
            .await
            .unwrap();
        let mut status = ProductStatus::new(product);
        let phase = reconciler
            .reconcile(&rhmi, &mut status, &**cluster)
            .await
            .unwrap();
        (phase, status)
    }

    fn namespace_exists(cluster: &InMemoryCluster, name: &str) -> bool {
        cluster.object::<Namespace>(None, name).is_some()
    }

    #[tokio::test]
    async fn test_product_without_package_completes() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.seed(&installation()).unwrap();

        let (phase, status) = reconcile_once(&cluster, ProductName::Grafana).await;

        assert_eq!(phase, StatusPhase::Completed);
        assert_eq!(status.version, "9.0.9");
        assert_eq!(
            status.host,
            "https://grafana-route-redhat-rhoam-customer-monitoring.apps.example.com"
        );
        assert!(namespace_exists(&cluster, "redhat-rhoam-customer-monitoring"));
        assert_eq!(cluster.count(Verb::Create, "Subscription"), 0);
        assert!(stored(&cluster)
            .unwrap()
            .has_finalizer(&ProductName::Grafana.finalizer()));

        let written = context(&cluster)
            .config_manager
            .read_product(ProductName::Grafana)
            .await
            .unwrap();
        assert_eq!(written.version(), Some("9.0.9"));
        assert_eq!(written.host(), Some(status.host.as_str()));
        assert_eq!(written.namespace(), Some("redhat-rhoam-customer-monitoring"));
    }

    #[tokio::test]
    async fn test_waiting_for_operator_is_stable_across_calls() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.seed(&installation()).unwrap();

        let (first, _) = reconcile_once(&cluster, ProductName::Rhsso).await;
        let (second, _) = reconcile_once(&cluster, ProductName::Rhsso).await;

        assert_eq!(first, StatusPhase::AwaitingOperator);
        assert_eq!(second, StatusPhase::AwaitingOperator);
        assert!(cluster
            .object::<Subscription>(Some("redhat-rhoam-rhsso-operator"), "rhmi-rhsso")
            .is_some());
        assert!(namespace_exists(&cluster, "redhat-rhoam-rhsso-operator"));
        // the product namespace waits for the operator
        assert!(!namespace_exists(&cluster, "redhat-rhoam-rhsso"));
        let rhmi = stored(&cluster).unwrap();
        let finalizer = ProductName::Rhsso.finalizer();
        assert_eq!(
            rhmi.finalizers().iter().filter(|f| **f == finalizer).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_uninstall_removes_namespaces_then_finalizer() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.seed(&installation()).unwrap();
        reconcile_once(&cluster, ProductName::Rhsso).await;
        cluster
            .seed(&Namespace {
                metadata: ObjectMeta {
                    name: Some("redhat-rhoam-rhsso".to_string()),
                    ..ObjectMeta::default()
                },
                ..Namespace::default()
            })
            .unwrap();
        typed::delete::<Rhmi>(&*cluster, Some(OPERATOR_NAMESPACE), "rhoam")
            .await
            .unwrap();
        assert!(stored(&cluster).unwrap().is_being_deleted());

        let (phase, _) = reconcile_once(&cluster, ProductName::Rhsso).await;

        assert_eq!(phase, StatusPhase::Completed);
        assert!(!namespace_exists(&cluster, "redhat-rhoam-rhsso"));
        assert!(!namespace_exists(&cluster, "redhat-rhoam-rhsso-operator"));
        // the product finalizer was the last one held
        assert!(stored(&cluster).is_none());
        assert_eq!(cluster.count(Verb::Create, "ConfigMap"), 0);
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace(ProductName::Rhsso, "redhat-rhoam-rhsso").is_ok());
        assert!(validate_namespace(ProductName::Rhsso, "Redhat_rhsso").is_err());
        assert!(validate_namespace(ProductName::Rhsso, "-rhsso").is_err());
        assert!(validate_namespace(ProductName::Rhsso, &"a".repeat(64)).is_err());
    }
}
