//! # Upgrade Approval

use crate::cluster::events::reference_for;
use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError, EventRecorder};
use crate::constants::EVENT_UPGRADE_APPROVED;
use crate::crd::{Rhmi, RhmiConfig};
use crate::observability::metrics;
use crate::olm::{InstallPlan, InstallPlanPhase};
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, info};

/// Approve `install_plan` so the package installer rolls the upgrade out
///
/// Does nothing while the plan is already installing. Returns whether this call
/// approved the plan.
pub async fn approve_upgrade(
    client: &dyn ClusterClient,
    recorder: &dyn EventRecorder,
    install_plan: &InstallPlan,
    retries: u32,
) -> Result<bool, ClusterError> {
    let name = install_plan.name_any();
    if install_plan.phase() == InstallPlanPhase::Installing {
        debug!(install_plan = %name, "Install plan already installing, not approving again");
        return Ok(false);
    }

    let mut changed = false;
    let approved = typed::modify::<InstallPlan, _>(
        client,
        install_plan.namespace().as_deref(),
        &name,
        Subresource::Main,
        retries,
        |plan| {
            if plan.spec.approved || plan.phase() == InstallPlanPhase::Installing {
                return false;
            }
            plan.spec.approved = true;
            changed = true;
            true
        },
    )
    .await?;
    let Some(approved) = approved.filter(|_| changed) else {
        return Ok(false);
    };

    let csv = approved
        .spec
        .cluster_service_version_names
        .first()
        .map(String::as_str)
        .unwrap_or_default();
    recorder
        .publish(
            &reference_for(&approved),
            EventType::Normal,
            EVENT_UPGRADE_APPROVED,
            format!("Approving {name} install plan: {csv}"),
        )
        .await;
    metrics::increment_upgrade_approvals();
    info!(install_plan = %name, csv, "Approved upgrade");
    Ok(true)
}

/// Record an approved upgrade: the installation moves towards `version` and the
/// upgrade schedule no longer has anything scheduled
pub async fn record_approval(
    client: &dyn ClusterClient,
    installation: &Rhmi,
    config: &RhmiConfig,
    version: Option<&str>,
    retries: u32,
) -> Result<(), ClusterError> {
    if let Some(version) = version {
        info!(version, "Update approved, setting version to install");
        let updated = typed::modify::<Rhmi, _>(
            client,
            installation.namespace().as_deref(),
            &installation.name_any(),
            Subresource::Status,
            retries,
            |rhmi| {
                let status = rhmi.status.get_or_insert_with(Default::default);
                if status.to_version.as_deref() == Some(version) {
                    return false;
                }
                status.to_version = Some(version.to_string());
                true
            },
        )
        .await?;
        if let Some(status) = updated.and_then(|rhmi| rhmi.status) {
            metrics::set_version_info(
                status.stage.map(|s| s.as_str()).unwrap_or_default(),
                status.version.as_deref().unwrap_or_default(),
                status.to_version.as_deref().unwrap_or_default(),
            );
        }
    }

    typed::modify::<RhmiConfig, _>(
        client,
        config.namespace().as_deref(),
        &config.name_any(),
        Subresource::Status,
        retries,
        |latest| match latest.status.as_mut() {
            Some(status) if status.upgrade.scheduled.is_some() => {
                status.upgrade.scheduled = None;
                true
            }
            _ => false,
        },
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, MemoryRecorder, Verb};
    use crate::olm::{Approval, InstallPlanSpec, InstallPlanStatus};

    fn plan(phase: InstallPlanPhase) -> InstallPlan {
        let mut plan = InstallPlan::new(
            "install-abc",
            InstallPlanSpec {
                cluster_service_version_names: vec!["integreatly-operator.v2.5.0".to_string()],
                approval: Approval::Manual,
                approved: false,
            },
        );
        plan.metadata.namespace = Some("redhat-rhmi-operator".to_string());
        plan.status = Some(InstallPlanStatus {
            phase,
            plan: Vec::new(),
        });
        plan
    }

    #[tokio::test]
    async fn test_installing_plan_left_alone() {
        let cluster = InMemoryCluster::new();
        let recorder = MemoryRecorder::new();
        let installing = plan(InstallPlanPhase::Installing);
        cluster.seed(&installing).unwrap();

        let approved = approve_upgrade(&cluster, &recorder, &installing, 3)
            .await
            .unwrap();
        assert!(!approved);
        let stored: InstallPlan = cluster
            .object(Some("redhat-rhmi-operator"), "install-abc")
            .unwrap();
        assert!(!stored.spec.approved);
        assert_eq!(cluster.count(Verb::Update, "InstallPlan"), 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_pending_plan_approved_once() {
        let cluster = InMemoryCluster::new();
        let recorder = MemoryRecorder::new();
        let pending = plan(InstallPlanPhase::RequiresApproval);
        cluster.seed(&pending).unwrap();

        assert!(approve_upgrade(&cluster, &recorder, &pending, 3).await.unwrap());
        let stored: InstallPlan = cluster
            .object(Some("redhat-rhmi-operator"), "install-abc")
            .unwrap();
        assert!(stored.spec.approved);

        let events = recorder.with_reason(EVENT_UPGRADE_APPROVED);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].note,
            "Approving install-abc install plan: integreatly-operator.v2.5.0"
        );

        // A second pass sees the stored, approved plan and changes nothing
        assert!(!approve_upgrade(&cluster, &recorder, &stored, 3).await.unwrap());
        assert_eq!(recorder.with_reason(EVENT_UPGRADE_APPROVED).len(), 1);
    }
}
