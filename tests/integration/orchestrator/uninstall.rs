//! Uninstall passes

use super::fixtures::{installation, Harness, NAME, NAMESPACE};
use kube_runtime::controller::Action;
use rhmi_operator::cluster::typed;
use rhmi_operator::constants::INSTALLATION_FINALIZER;
use rhmi_operator::crd::{PreflightStatus, ProductName, Rhmi, RhmiStatus, StageName, StatusPhase};

async fn deleted_installation(harness: &Harness, products: &[ProductName]) {
    let mut rhmi = installation("managed-api");
    let mut finalizers = vec![INSTALLATION_FINALIZER.to_string()];
    finalizers.extend(products.iter().map(|p| p.finalizer()));
    rhmi.metadata.finalizers = Some(finalizers);
    rhmi.status = Some(RhmiStatus {
        preflight_status: Some(PreflightStatus::Successful),
        stage: Some(StageName::Complete),
        ..RhmiStatus::default()
    });
    harness.seed(&rhmi);
    typed::delete::<Rhmi>(&*harness.cluster, Some(NAMESPACE), NAME)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_uninstall_stages_run_in_order() {
    let harness = Harness::new();
    deleted_installation(&harness, &[ProductName::Rhsso, ProductName::CloudResources]).await;
    harness
        .script
        .set(ProductName::Rhsso, StatusPhase::InProgress);

    // Cloud resources wait for the products using them
    let action = harness.pass().await;
    assert_ne!(action, Action::await_change());
    assert_eq!(harness.script.calls(), vec![ProductName::Rhsso]);
    let stored = harness.stored().expect("installation is held");
    assert!(stored.has_finalizer(INSTALLATION_FINALIZER));
    let status = harness.status();
    assert_eq!(status.stage, Some(StageName::Deletion));
    assert_eq!(
        status.stages[&StageName::UninstallProducts].phase,
        StatusPhase::InProgress
    );
    assert!(!status
        .stages
        .contains_key(&StageName::UninstallCloudResources));

    harness.script.set(ProductName::Rhsso, StatusPhase::Completed);
    harness.script.clear_calls();
    let action = harness.pass().await;

    assert_eq!(action, Action::await_change());
    assert_eq!(
        harness.script.calls(),
        vec![ProductName::Rhsso, ProductName::CloudResources]
    );
    assert!(harness.stored().is_none());
}

#[tokio::test]
async fn test_products_without_finalizers_are_not_reconciled() {
    let harness = Harness::new();
    deleted_installation(&harness, &[]).await;

    let action = harness.pass().await;

    assert_eq!(action, Action::await_change());
    assert!(harness.script.calls().is_empty());
    assert!(harness.stored().is_none());
}

#[tokio::test]
async fn test_failed_product_removal_keeps_installation() {
    let harness = Harness::new();
    deleted_installation(&harness, &[ProductName::ThreeScale]).await;
    harness
        .script
        .fail(ProductName::ThreeScale, "3scale tenants still present");

    harness.pass().await;

    let stored = harness.stored().expect("installation is held");
    assert!(stored.has_finalizer(INSTALLATION_FINALIZER));
    let status = harness.status();
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("3scale tenants still present")));
    let product = &status.stages[&StageName::UninstallProducts].products[&ProductName::ThreeScale];
    assert_eq!(product.last_error.as_deref(), Some("3scale tenants still present"));
}
