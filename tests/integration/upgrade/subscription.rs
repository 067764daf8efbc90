//! The subscription controller entry point

use super::fixtures::{subscription, UpgradeHarness, NAMESPACE};
use kube_runtime::controller::Action;
use rhmi_operator::cluster::Verb;
use rhmi_operator::crd::Upgrade;
use rhmi_operator::olm::{Approval, Subscription};
use rhmi_operator::upgrade::reconcile_subscription;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_operator_subscription_is_switched_to_manual_approval() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), false);
    let sub = subscription("integreatly", Approval::Automatic);
    harness.cluster.seed(&sub).unwrap();

    let action = reconcile_subscription(Arc::new(sub), Arc::clone(&harness.ctx))
        .await
        .unwrap();

    assert_eq!(action, Action::requeue(Duration::from_secs(10)));
    let stored: Subscription = harness.cluster.object(Some(NAMESPACE), "integreatly").unwrap();
    assert_eq!(stored.spec.install_plan_approval, Some(Approval::Manual));
    assert!(harness.plan().spec.approved);
}

#[tokio::test]
async fn test_waiting_upgrade_is_requeued() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), true);
    let sub = subscription("addon-rhmi", Approval::Manual);
    harness.cluster.seed(&sub).unwrap();

    let action = reconcile_subscription(Arc::new(sub), Arc::clone(&harness.ctx))
        .await
        .unwrap();

    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    assert_eq!(harness.cluster.count(Verb::Update, "Subscription"), 0);
}

#[tokio::test]
async fn test_product_subscriptions_are_ignored() {
    let harness = UpgradeHarness::new();
    harness.seed(Upgrade::default(), false);
    let sub = subscription("rhsso-operator", Approval::Automatic);
    harness.cluster.seed(&sub).unwrap();

    let action = reconcile_subscription(Arc::new(sub), Arc::clone(&harness.ctx))
        .await
        .unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(harness.cluster.count(Verb::Update, "Subscription"), 0);
    assert!(!harness.plan().spec.approved);
}
