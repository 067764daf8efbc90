use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::marketplace::{PackageInstaller, Target};
use crate::olm::{Approval, ClusterServiceVersion, InstallPlan, InstallPlanPhase, Subscription};
use crate::StatusPhase;
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Subscribe `target.namespace` to the operator package and report how far it got
///
/// Returns `Completed` only once the install plan has been applied and every CSV it
/// names exists and has not failed. A failed plan or CSV removes the subscription (and
/// the failed CSV) so the package installer starts over.
pub async fn reconcile_subscription(
    client: &dyn ClusterClient,
    installer: &dyn PackageInstaller,
    target: &Target,
    retries: u32,
) -> Result<StatusPhase, ClusterError> {
    debug!(
        subscription = %target.subscription_name,
        channel = %target.channel,
        namespace = %target.namespace,
        "Reconciling subscription"
    );
    match installer
        .install_operator(client, target, Approval::Manual)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_already_exists() => {}
        Err(e) => return Err(e),
    }

    let plans = match installer
        .get_subscription_install_plans(client, &target.subscription_name, &target.namespace)
        .await
    {
        Ok(plans) => plans,
        Err(e) if e.is_not_found() => return Ok(StatusPhase::CreatingSubscription),
        Err(e) => return Err(e),
    };
    let subscription = &plans.subscription;
    let Some(plan) = plans.latest() else {
        return Ok(StatusPhase::AwaitingOperator);
    };

    if plan.phase() == InstallPlanPhase::Failed {
        let installed = installed_csv(subscription);
        return retry_installation(client, target, subscription, installed.as_deref()).await;
    }

    let installed = installed_csv(subscription);
    if !plan.spec.approved && installed.is_none() {
        approve_initial_plan(client, plan, retries).await?;
        return Ok(StatusPhase::AwaitingOperator);
    }
    if plan.spec.approved && plan.phase() != InstallPlanPhase::Complete {
        debug!(subscription = %target.subscription_name, "Install plan not complete yet");
        return Ok(StatusPhase::InProgress);
    }

    // an upgrade still waiting for approval leaves the installed version in place
    let csv_names = if plan.spec.approved {
        plan.spec.cluster_service_version_names.clone()
    } else {
        installed.into_iter().collect()
    };
    for csv_name in csv_names {
        let Some(csv) =
            typed::get_opt::<ClusterServiceVersion>(client, Some(&target.namespace), &csv_name)
                .await?
        else {
            debug!(csv = %csv_name, "Waiting for CSV to be created");
            return Ok(StatusPhase::InProgress);
        };
        if csv.is_failed() {
            warn!(csv = %csv_name, "CSV failed, retrying operator installation");
            return retry_installation(client, target, subscription, Some(&csv_name)).await;
        }
    }
    Ok(StatusPhase::Completed)
}

fn installed_csv(subscription: &Subscription) -> Option<String> {
    subscription
        .status
        .as_ref()
        .and_then(|s| s.installed_csv.clone())
        .filter(|csv| !csv.is_empty())
}

async fn approve_initial_plan(
    client: &dyn ClusterClient,
    plan: &InstallPlan,
    retries: u32,
) -> Result<(), ClusterError> {
    info!(install_plan = %plan.name_any(), "Approving initial install plan");
    typed::modify::<InstallPlan, _>(
        client,
        plan.namespace().as_deref(),
        &plan.name_any(),
        Subresource::Main,
        retries,
        |latest| {
            if latest.spec.approved {
                return false;
            }
            latest.spec.approved = true;
            true
        },
    )
    .await?;
    Ok(())
}

async fn retry_installation(
    client: &dyn ClusterClient,
    target: &Target,
    subscription: &Subscription,
    csv: Option<&str>,
) -> Result<StatusPhase, ClusterError> {
    if let Some(csv) = csv {
        warn!(csv, namespace = %target.namespace, "Deleting CSV for re-install");
        typed::delete::<ClusterServiceVersion>(client, Some(&target.namespace), csv).await?;
    }
    warn!(
        subscription = %subscription.name_any(),
        namespace = %target.namespace,
        "Deleting subscription for re-install"
    );
    typed::delete::<Subscription>(client, Some(&target.namespace), &subscription.name_any())
        .await?;
    Ok(StatusPhase::AwaitingOperator)
}
