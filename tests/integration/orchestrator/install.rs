//! Install passes

use super::fixtures::{installation, product_status, Harness, CONSOLE_HOST};
use kube_runtime::controller::Action;
use rhmi_operator::constants::{
    EVENT_INSTALLATION_COMPLETED, EVENT_PREFLIGHT_CHECK_PASSED, EVENT_PROCESSING_ERROR,
    INSTALLATION_FINALIZER,
};
use rhmi_operator::crd::{
    PreflightStatus, ProductName, RhmiStatus, StageName, StageStatus, StatusPhase,
};
use std::collections::BTreeMap;
use std::time::Duration;

const SUITE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::test]
async fn test_preflight_runs_before_any_stage() {
    let harness = Harness::new();
    harness.seed(&installation("managed-api"));
    harness.seed_console_route().await;

    let action = harness.pass().await;

    assert_eq!(action, Action::requeue(Duration::from_secs(10)));
    let status = harness.status();
    assert_eq!(status.preflight_status, Some(PreflightStatus::Successful));
    assert_eq!(status.stage, Some(StageName::PreflightChecks));
    assert!(status.stages.is_empty());
    assert!(harness.script.calls().is_empty());
    assert_eq!(
        harness.recorder.with_reason(EVENT_PREFLIGHT_CHECK_PASSED).len(),
        1
    );
}

#[tokio::test]
async fn test_products_wait_for_bootstrap() {
    let harness = Harness::new();
    harness.seed(&installation("managed-api"));
    harness.pass().await;

    // No console route: bootstrap cannot complete
    harness.pass().await;
    let status = harness.status();
    assert_eq!(status.stages[&StageName::Bootstrap].phase, StatusPhase::Failed);
    assert!(!status.stages.contains_key(&StageName::Installation));
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("could not find console route")));
    assert!(harness.script.calls().is_empty());
    let errors = harness.recorder.with_reason(EVENT_PROCESSING_ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].warning);

    harness.seed_console_route().await;
    harness.pass().await;
    let status = harness.status();
    assert_eq!(status.stage, Some(StageName::Complete));
    assert_eq!(status.last_error, None);
    assert_eq!(
        harness.script.calls(),
        vec![
            ProductName::CloudResources,
            ProductName::Rhsso,
            ProductName::RhssoUser,
            ProductName::ThreeScale,
            ProductName::Marin3r,
            ProductName::Grafana,
        ]
    );
    let stored = harness.stored().unwrap();
    assert_eq!(stored.spec.master_url.as_deref(), Some(CONSOLE_HOST));
    assert_eq!(stored.spec.routing_subdomain.as_deref(), Some("apps.example.com"));
}

#[tokio::test]
async fn test_incomplete_product_holds_installation() {
    let harness = Harness::new();
    harness.seed(&installation("managed-api"));
    harness.seed_console_route().await;
    harness
        .script
        .set(ProductName::ThreeScale, StatusPhase::AwaitingOperator);
    harness.pass().await;

    let action = harness.pass().await;
    assert_eq!(action, Action::requeue(Duration::from_secs(10)));
    let status = harness.status();
    assert_eq!(status.stage, Some(StageName::Installation));
    let stage = &status.stages[&StageName::Installation];
    assert_eq!(stage.phase, StatusPhase::InProgress);
    assert_eq!(
        stage.products[&ProductName::ThreeScale].phase,
        StatusPhase::AwaitingOperator
    );
    assert_eq!(status.version, None);
    assert_eq!(status.to_version.as_deref(), Some(SUITE_VERSION));
    assert!(harness
        .recorder
        .with_reason(EVENT_INSTALLATION_COMPLETED)
        .is_empty());
    assert!(harness.stored().unwrap().has_finalizer(INSTALLATION_FINALIZER));

    harness
        .script
        .set(ProductName::ThreeScale, StatusPhase::Completed);
    let action = harness.pass().await;
    assert_eq!(action, Action::requeue(Duration::from_secs(300)));
    let status = harness.status();
    assert_eq!(status.stage, Some(StageName::Complete));
    assert_eq!(status.version.as_deref(), Some(SUITE_VERSION));
    assert_eq!(status.to_version, None);

    // Later passes over a complete installation stay quiet
    harness.pass().await;
    assert_eq!(
        harness.recorder.with_reason(EVENT_INSTALLATION_COMPLETED).len(),
        1
    );
}

#[tokio::test]
async fn test_retry_skips_completed_products() {
    let harness = Harness::new();
    let mut rhmi = installation("managed-api");
    rhmi.status = Some(RhmiStatus {
        preflight_status: Some(PreflightStatus::Successful),
        stage: Some(StageName::Installation),
        stages: BTreeMap::from([(
            StageName::Installation,
            StageStatus {
                name: StageName::Installation,
                phase: StatusPhase::Failed,
                products: BTreeMap::from([
                    product_status(ProductName::Rhsso, StatusPhase::Completed),
                    product_status(ProductName::ThreeScale, StatusPhase::Failed),
                ]),
            },
        )]),
        ..RhmiStatus::default()
    });
    harness.seed(&rhmi);
    harness.seed_console_route().await;

    harness.pass().await;

    let calls = harness.script.calls();
    assert!(!calls.contains(&ProductName::Rhsso));
    assert!(calls.contains(&ProductName::ThreeScale));
    let status = harness.status();
    assert_eq!(
        status.stages[&StageName::Installation].phase,
        StatusPhase::Completed
    );
    assert_eq!(status.stage, Some(StageName::Complete));
}

#[tokio::test]
async fn test_failed_product_fails_stage() {
    let harness = Harness::new();
    harness.seed(&installation("managed-api"));
    harness.seed_console_route().await;
    harness
        .script
        .fail(ProductName::Grafana, "grafana operator crashed");
    harness.pass().await;

    harness.pass().await;

    let status = harness.status();
    let stage = &status.stages[&StageName::Installation];
    assert_eq!(stage.phase, StatusPhase::Failed);
    let grafana = &stage.products[&ProductName::Grafana];
    assert_eq!(grafana.phase, StatusPhase::Failed);
    assert_eq!(grafana.last_error.as_deref(), Some("grafana operator crashed"));
    assert_eq!(stage.products[&ProductName::Rhsso].phase, StatusPhase::Completed);
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("grafana operator crashed")));

    let errors = harness.recorder.with_reason(EVENT_PROCESSING_ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].note.starts_with("Failed to process stage"));
}

#[tokio::test]
async fn test_unknown_installation_type_waits_for_change() {
    let harness = Harness::new();
    harness.seed(&installation("not-a-flavor"));

    let action = harness.pass().await;

    assert_eq!(action, Action::await_change());
    let status = harness.status();
    assert_eq!(
        status.last_error.as_deref(),
        Some("unknown installation type: not-a-flavor")
    );
    assert_eq!(status.preflight_status, None);
    assert!(harness.script.calls().is_empty());
    assert!(!harness.stored().unwrap().has_finalizer(INSTALLATION_FINALIZER));
}
