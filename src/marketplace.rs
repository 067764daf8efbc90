//! # Marketplace
//!
//! Package installer capability: subscribes a namespace to an operator package through
//! the operator lifecycle manager and reports the resulting install plans.

use crate::cluster::typed;
use crate::cluster::{ClusterClient, ClusterError, Labels};
use crate::constants::{
    DEFAULT_CATALOG_SOURCE, DEFAULT_CATALOG_SOURCE_NAMESPACE, DEFAULT_OPERATOR_GROUP_NAME,
    LABEL_INTEGREATLY,
};
use crate::olm::{
    Approval, InstallPlan, OperatorGroup, OperatorGroupSpec, Subscription, SubscriptionSpec,
};
use async_trait::async_trait;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Operator package to install and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub package: String,
    pub channel: String,
    pub namespace: String,
    pub subscription_name: String,
    pub catalog_source: String,
    pub catalog_source_namespace: String,
}

impl Target {
    /// Target subscribing to `package` from the default catalog, named after the package
    pub fn new(package: &str, channel: &str, namespace: &str) -> Self {
        Self {
            package: package.to_string(),
            channel: channel.to_string(),
            namespace: namespace.to_string(),
            subscription_name: package.to_string(),
            catalog_source: DEFAULT_CATALOG_SOURCE.to_string(),
            catalog_source_namespace: DEFAULT_CATALOG_SOURCE_NAMESPACE.to_string(),
        }
    }
}

/// A subscription and the install plans in its namespace
#[derive(Debug, Clone)]
pub struct SubscriptionPlans {
    pub subscription: Subscription,
    pub install_plans: Vec<InstallPlan>,
}

impl SubscriptionPlans {
    /// The plan the subscription currently points at
    pub fn latest(&self) -> Option<&InstallPlan> {
        let reference = self.subscription.install_plan_ref()?;
        self.install_plans
            .iter()
            .find(|plan| plan.metadata.name.as_deref() == Some(reference.name.as_str()))
    }
}

#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Create the operator group and the subscription for `target`
    ///
    /// Returns `AlreadyExists` when the subscription is already there.
    async fn install_operator(
        &self,
        client: &dyn ClusterClient,
        target: &Target,
        approval: Approval,
    ) -> Result<(), ClusterError>;

    /// The named subscription and its install plans; `NotFound` when there is no subscription
    async fn get_subscription_install_plans(
        &self,
        client: &dyn ClusterClient,
        name: &str,
        namespace: &str,
    ) -> Result<SubscriptionPlans, ClusterError>;
}

/// [`PackageInstaller`] backed by the operator lifecycle manager objects
#[derive(Debug, Clone, Default)]
pub struct MarketplaceManager;

impl MarketplaceManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageInstaller for MarketplaceManager {
    async fn install_operator(
        &self,
        client: &dyn ClusterClient,
        target: &Target,
        approval: Approval,
    ) -> Result<(), ClusterError> {
        let mut group = OperatorGroup::new(
            DEFAULT_OPERATOR_GROUP_NAME,
            OperatorGroupSpec {
                target_namespaces: vec![target.namespace.clone()],
            },
        );
        group.metadata.namespace = Some(target.namespace.clone());
        group.metadata.labels = Some(BTreeMap::from([(
            LABEL_INTEGREATLY.to_string(),
            target.subscription_name.clone(),
        )]));
        match typed::create(client, &group).await {
            Ok(_) => debug!(namespace = %target.namespace, "Created operator group"),
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }

        let subscription = Subscription {
            metadata: ObjectMeta {
                name: Some(target.subscription_name.clone()),
                namespace: Some(target.namespace.clone()),
                ..ObjectMeta::default()
            },
            spec: SubscriptionSpec {
                source: target.catalog_source.clone(),
                source_namespace: target.catalog_source_namespace.clone(),
                name: target.package.clone(),
                channel: Some(target.channel.clone()),
                install_plan_approval: Some(approval),
                starting_csv: None,
            },
            status: None,
        };
        typed::create(client, &subscription).await?;
        info!(
            package = %target.package,
            namespace = %target.namespace,
            "Created subscription"
        );
        Ok(())
    }

    async fn get_subscription_install_plans(
        &self,
        client: &dyn ClusterClient,
        name: &str,
        namespace: &str,
    ) -> Result<SubscriptionPlans, ClusterError> {
        let subscription: Subscription = typed::get(client, Some(namespace), name).await?;
        let install_plans = match subscription.install_plan_ref() {
            Some(reference) => {
                typed::list(client, Some(&reference.namespace), &Labels::new()).await?
            }
            None => Vec::new(),
        };
        Ok(SubscriptionPlans {
            subscription,
            install_plans,
        })
    }
}
