//! Decisions on pending install plans

use super::fixtures::{subscription, UpgradeHarness, INSTALLED_CSV, NEXT_CSV, PLAN};
use chrono::Utc;
use rhmi_operator::cluster::Verb;
use rhmi_operator::constants::EVENT_UPGRADE_APPROVED;
use rhmi_operator::crd::{Upgrade, UpgradeScheduleCalculation};
use rhmi_operator::olm::Approval;
use rhmi_operator::upgrade::UpgradeDecision;

#[tokio::test]
async fn test_safe_upgrade_is_approved_straight_away() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), false);
    let sub = subscription("integreatly", Approval::Manual);

    let decision = harness.ctx.handle_upgrades(&sub, Utc::now()).await.unwrap();

    assert_eq!(decision, UpgradeDecision::Approved);
    assert!(harness.plan().spec.approved);
    let events = harness.recorder.with_reason(EVENT_UPGRADE_APPROVED);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].note,
        format!("Approving {PLAN} install plan: {NEXT_CSV}")
    );
    let status = harness.installation().status.unwrap();
    assert_eq!(status.version.as_deref(), Some("2.4.0"));
    assert_eq!(status.to_version.as_deref(), Some("2.5.0"));
    let config_status = harness.config().status.unwrap();
    assert_eq!(config_status.upgrade.scheduled, None);
    assert!(config_status.maintenance.apply_from.is_some());
}

#[tokio::test]
async fn test_approval_is_announced_once() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), false);
    let sub = subscription("integreatly", Approval::Manual);

    harness.ctx.handle_upgrades(&sub, Utc::now()).await.unwrap();
    let decision = harness.ctx.handle_upgrades(&sub, Utc::now()).await.unwrap();

    assert_eq!(decision, UpgradeDecision::Approved);
    assert_eq!(harness.recorder.with_reason(EVENT_UPGRADE_APPROVED).len(), 1);
    assert_eq!(harness.config().status.unwrap().upgrade.window, None);
}

#[tokio::test]
async fn test_service_affecting_upgrade_waits_for_schedule() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), true);
    let sub = subscription("integreatly", Approval::Manual);

    let decision = harness.ctx.handle_upgrades(&sub, Utc::now()).await.unwrap();

    assert_eq!(decision, UpgradeDecision::Waiting);
    assert!(!harness.plan().spec.approved);
    assert!(harness.recorder.events().is_empty());
    assert_eq!(harness.installation().status.unwrap().to_version, None);

    let status = harness.config().status.unwrap();
    assert!(status.upgrade.window.is_some());
    let scheduled = status.upgrade.scheduled.unwrap();
    assert_eq!(
        scheduled.calculated_from,
        UpgradeScheduleCalculation::TwoWeeksMaintenanceWindow
    );
    assert_eq!(status.maintenance.duration.as_deref(), Some("6hrs"));
}

#[tokio::test]
async fn test_always_immediately_overrides_the_schedule() {
    let harness = UpgradeHarness::new();
    harness.seed(
        Upgrade {
            always_immediately: true,
            ..Upgrade::default()
        },
        true,
    );
    let sub = subscription("integreatly", Approval::Manual);

    let decision = harness.ctx.handle_upgrades(&sub, Utc::now()).await.unwrap();

    assert_eq!(decision, UpgradeDecision::Approved);
    assert!(harness.plan().spec.approved);
}

#[tokio::test]
async fn test_nothing_pending_touches_nothing() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), false);
    let mut sub = subscription("integreatly", Approval::Manual);
    if let Some(status) = sub.status.as_mut() {
        status.current_csv = Some(INSTALLED_CSV.to_string());
    }

    let decision = harness.ctx.handle_upgrades(&sub, Utc::now()).await.unwrap();

    assert_eq!(decision, UpgradeDecision::NoUpgrade);
    assert_eq!(harness.cluster.count(Verb::Get, "InstallPlan"), 0);
    assert!(!harness.plan().spec.approved);
}

#[tokio::test]
async fn test_missing_install_plan_reference_is_an_error() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), false);
    let mut sub = subscription("integreatly", Approval::Manual);
    if let Some(status) = sub.status.as_mut() {
        status.install_plan_ref = None;
    }

    let err = harness
        .ctx
        .handle_upgrades(&sub, Utc::now())
        .await
        .unwrap_err();

    assert_eq!(err.as_str(), "missing_install_plan_ref");
}
