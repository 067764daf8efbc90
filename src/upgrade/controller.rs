//! # Subscription Controller
//!
//! Watches the operator's own subscription. Install plans are always approved manually:
//! a pending upgrade is approved straight away when it is not service affecting, and
//! otherwise only inside the window the upgrade schedule allows.

use super::approval::{approve_upgrade, record_approval};
use super::error::UpgradeError;
use super::schedule::{
    can_upgrade_now, is_upgrade_available, is_upgrade_service_affecting, update_status,
};
use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, EventRecorder, Labels};
use crate::config::ControllerConfig;
use crate::constants::{OPERATOR_SUBSCRIPTION_NAMES, RHMI_CONFIG_NAME};
use crate::crd::{Rhmi, RhmiConfig};
use crate::observability::metrics;
use crate::olm::{Approval, InstallPlan, Subscription};
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

/// What one evaluation decided about a pending upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Nothing to upgrade to
    NoUpgrade,
    /// The install plan was approved (or is already rolling out)
    Approved,
    /// Service affecting and outside the allowed window
    Waiting,
}

impl UpgradeDecision {
    /// Get label string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeDecision::NoUpgrade => "none",
            UpgradeDecision::Approved => "approved",
            UpgradeDecision::Waiting => "waiting",
        }
    }
}

/// Shared state of the subscription controller
pub struct UpgradeContext {
    client: Arc<dyn ClusterClient>,
    recorder: Arc<dyn EventRecorder>,
    config: Arc<ControllerConfig>,
}

impl std::fmt::Debug for UpgradeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UpgradeContext {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        recorder: Arc<dyn EventRecorder>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        Self {
            client,
            recorder,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Evaluate the pending upgrade of `subscription` at `now`
    pub async fn handle_upgrades(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<UpgradeDecision, UpgradeError> {
        let client = &*self.client;
        let retries = self.config.status_write_retries;
        let installed = subscription
            .status
            .as_ref()
            .and_then(|s| s.installed_csv.as_deref())
            .unwrap_or_default();
        if !is_upgrade_available(subscription) || installed.is_empty() {
            debug!("No upgrade available");
            return Ok(UpgradeDecision::NoUpgrade);
        }

        let plan_ref = subscription
            .install_plan_ref()
            .ok_or(UpgradeError::MissingInstallPlanRef)?;
        let install_plan =
            typed::get::<InstallPlan>(client, Some(&plan_ref.namespace), &plan_ref.name).await?;
        let csv = install_plan
            .embedded_csv()
            .map_err(|source| UpgradeError::EmbeddedCsv {
                plan: install_plan.name_any(),
                source,
            })?;

        let namespace = self.config.watch_namespace.as_str();
        let stored = typed::get::<RhmiConfig>(client, Some(namespace), RHMI_CONFIG_NAME).await?;
        let mut config = stored.clone();
        update_status(&mut config, &install_plan, now)?;
        if config.status != stored.status {
            let status = config.status.clone();
            if let Some(written) = typed::modify::<RhmiConfig, _>(
                client,
                Some(namespace),
                RHMI_CONFIG_NAME,
                Subresource::Status,
                retries,
                |latest| {
                    if latest.status == status {
                        return false;
                    }
                    latest.status.clone_from(&status);
                    true
                },
            )
            .await?
            {
                config = written;
            }
        }

        let service_affecting = is_upgrade_service_affecting(csv.as_ref());
        if service_affecting && !can_upgrade_now(&config, now)? {
            info!(
                install_plan = %install_plan.name_any(),
                "Not automatically upgrading a service affecting release"
            );
            return Ok(UpgradeDecision::Waiting);
        }

        if approve_upgrade(client, &*self.recorder, &install_plan, retries).await? {
            let installation = typed::list::<Rhmi>(client, Some(namespace), &Labels::new())
                .await?
                .into_iter()
                .next();
            if let Some(installation) = installation {
                let version = csv.as_ref().and_then(|c| c.spec.version.as_deref());
                record_approval(client, &installation, &config, version, retries).await?;
            }
        }
        Ok(UpgradeDecision::Approved)
    }
}

fn is_operator_subscription(subscription: &Subscription, watch_namespace: &str) -> bool {
    subscription.namespace().as_deref() == Some(watch_namespace)
        && OPERATOR_SUBSCRIPTION_NAMES.contains(&subscription.name_any().as_str())
}

async fn reconcile_operator_subscription(
    subscription: &Subscription,
    ctx: &UpgradeContext,
) -> Result<Action, UpgradeError> {
    let manual = typed::modify::<Subscription, _>(
        &*ctx.client,
        subscription.namespace().as_deref(),
        &subscription.name_any(),
        Subresource::Main,
        ctx.config.status_write_retries,
        |latest| {
            if latest.spec.install_plan_approval == Some(Approval::Manual) {
                return false;
            }
            latest.spec.install_plan_approval = Some(Approval::Manual);
            true
        },
    )
    .await?;
    let Some(subscription) = manual else {
        return Ok(Action::await_change());
    };

    let decision = ctx.handle_upgrades(&subscription, Utc::now()).await?;
    metrics::increment_upgrade_decisions(decision.as_str());
    Ok(match decision {
        UpgradeDecision::NoUpgrade => Action::await_change(),
        UpgradeDecision::Approved => Action::requeue(ctx.config.upgrade_approved_requeue()),
        UpgradeDecision::Waiting => Action::requeue(ctx.config.upgrade_wait_requeue()),
    })
}

/// Reconcile one Subscription object
pub async fn reconcile_subscription(
    subscription: Arc<Subscription>,
    ctx: Arc<UpgradeContext>,
) -> Result<Action, UpgradeError> {
    let name = subscription.name_any();
    if !is_operator_subscription(&subscription, &ctx.config.watch_namespace) {
        debug!(subscription = %name, "Not the operator's subscription, ignoring");
        return Ok(Action::await_change());
    }

    let span = info_span!("upgrade", subscription = %name);
    reconcile_operator_subscription(&subscription, &ctx)
        .instrument(span)
        .await
}
