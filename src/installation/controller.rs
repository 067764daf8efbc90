//! # Installation Controller
//!
//! kube-runtime entry point for RHMI objects: run one orchestration pass, write the
//! resulting status back and tell the runtime when to come back.

use super::error::OrchestratorError;
use super::orchestrator::{Orchestrator, ReconcileOutcome};
use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::crd::{Rhmi, RhmiStatus};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Replace the stored status with `status` unless it is already current
///
/// A vanished installation (uninstall finished) is not an error.
pub async fn write_status(
    client: &dyn ClusterClient,
    installation: &Rhmi,
    status: &RhmiStatus,
    retries: u32,
) -> Result<(), ClusterError> {
    if installation.status.as_ref() == Some(status) {
        return Ok(());
    }
    let name = installation.name_any();
    let written = typed::modify::<Rhmi, _>(
        client,
        installation.namespace().as_deref(),
        &name,
        Subresource::Status,
        retries,
        |latest| {
            if latest.status.as_ref() == Some(status) {
                return false;
            }
            latest.status = Some(status.clone());
            true
        },
    )
    .await?;
    if written.is_none() {
        debug!(installation = %name, "Installation gone, status not written");
    }
    Ok(())
}

fn requeue_reason(outcome: &ReconcileOutcome) -> &'static str {
    match (&outcome.error, outcome.phase.is_completed()) {
        (Some(_), _) => "error",
        (None, true) => "complete",
        (None, false) => "in_progress",
    }
}

/// Reconcile one RHMI object
pub async fn reconcile_installation(
    installation: Arc<Rhmi>,
    orchestrator: Arc<Orchestrator>,
) -> Result<Action, OrchestratorError> {
    let started = Instant::now();
    metrics::increment_reconciliations();
    let name = installation.name_any();
    let span = info_span!("reconcile", installation = %name);

    let mut status = installation.status.clone().unwrap_or_default();
    let outcome = orchestrator
        .run(&installation, &mut status)
        .instrument(span)
        .await;

    let written = write_status(
        &**orchestrator.client(),
        &installation,
        &status,
        orchestrator.config().status_write_retries,
    )
    .await;
    metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());
    written?;

    metrics::set_version_info(
        status.stage.map(|s| s.as_str()).unwrap_or_default(),
        status.version.as_deref().unwrap_or_default(),
        status.to_version.as_deref().unwrap_or_default(),
    );
    if let Some(error) = &outcome.error {
        metrics::increment_reconciliation_errors(error.as_str());
        warn!(installation = %name, phase = %outcome.phase, error = %error, "Reconciliation pass finished with errors");
    }

    match outcome.requeue_after {
        Some(delay) => {
            metrics::increment_requeues_total(requeue_reason(&outcome));
            Ok(Action::requeue(delay))
        }
        None => Ok(Action::await_change()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::crd::{StageName, StatusPhase};
    use crate::RhmiSpec;

    fn installation() -> Rhmi {
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
        rhmi
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_written() {
        let cluster = InMemoryCluster::new();
        let mut rhmi = installation();
        rhmi.status = Some(RhmiStatus::default());
        cluster.seed(&rhmi).unwrap();
        write_status(&cluster, &rhmi, &RhmiStatus::default(), 3)
            .await
            .unwrap();
        assert_eq!(cluster.count(crate::cluster::Verb::UpdateStatus, "RHMI"), 0);
    }

    #[tokio::test]
    async fn test_status_written() {
        let cluster = InMemoryCluster::new();
        let rhmi = installation();
        cluster.seed(&rhmi).unwrap();
        let status = RhmiStatus {
            stage: Some(StageName::Bootstrap),
            ..RhmiStatus::default()
        };
        write_status(&cluster, &rhmi, &status, 3).await.unwrap();
        let stored: Rhmi = cluster.object(Some("redhat-rhmi-operator"), "rhoam").unwrap();
        assert_eq!(stored.status, Some(status));
    }

    #[tokio::test]
    async fn test_vanished_installation_is_ignored() {
        let cluster = InMemoryCluster::new();
        let status = RhmiStatus::default();
        assert!(write_status(&cluster, &installation(), &status, 3).await.is_ok());
    }

    #[test]
    fn test_requeue_reason() {
        let outcome = ReconcileOutcome {
            phase: StatusPhase::Completed,
            requeue_after: None,
            error: None,
        };
        assert_eq!(requeue_reason(&outcome), "complete");
    }
}
