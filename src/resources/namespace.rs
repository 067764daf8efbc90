use super::labels::prepare_object_labels;
use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::{Rhmi, StatusPhase};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use tracing::{debug, info};

fn phase_of(namespace: &Namespace) -> Option<&str> {
    namespace.status.as_ref()?.phase.as_deref()
}

fn is_terminating(namespace: &Namespace) -> bool {
    namespace.metadata.deletion_timestamp.is_some() || phase_of(namespace) == Some("Terminating")
}

/// Get or create the namespace `name`, labelled as owned by `owner`
///
/// A terminating namespace is waited for, never forced: the call returns
/// `AwaitingComponents` until it is gone and can be created again.
pub async fn reconcile_namespace(
    client: &dyn ClusterClient,
    name: &str,
    owner: &Rhmi,
    retries: u32,
) -> Result<StatusPhase, ClusterError> {
    let Some(existing) = typed::get_opt::<Namespace>(client, None, name).await? else {
        let mut namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        prepare_object_labels(&mut namespace.metadata, owner);
        match typed::create(client, &namespace).await {
            Ok(_) => info!(namespace = name, "Created namespace"),
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }
        return Ok(StatusPhase::Completed);
    };

    if is_terminating(&existing) {
        debug!(namespace = name, "Namespace terminating, waiting for it to go");
        return Ok(StatusPhase::AwaitingComponents);
    }

    let updated = typed::modify::<Namespace, _>(
        client,
        None,
        name,
        Subresource::Main,
        retries,
        |namespace| prepare_object_labels(&mut namespace.metadata, owner),
    )
    .await?;

    // deleted between the read and the write
    let Some(updated) = updated else {
        return Ok(StatusPhase::InProgress);
    };
    // the phase is only absent before the API server has written status
    match phase_of(&updated) {
        Some("Active") | None => Ok(StatusPhase::Completed),
        Some(_) => Ok(StatusPhase::InProgress),
    }
}

/// Delete the namespace `name`, returning `Completed` only once it no longer exists
pub async fn delete_namespace(
    client: &dyn ClusterClient,
    name: &str,
) -> Result<StatusPhase, ClusterError> {
    let Some(existing) = typed::get_opt::<Namespace>(client, None, name).await? else {
        return Ok(StatusPhase::Completed);
    };
    if !is_terminating(&existing) {
        info!(namespace = name, "Deleting namespace");
        typed::delete::<Namespace>(client, None, name).await?;
        if typed::get_opt::<Namespace>(client, None, name).await?.is_none() {
            return Ok(StatusPhase::Completed);
        }
    }
    Ok(StatusPhase::InProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, Verb};
    use crate::RhmiSpec;
    use k8s_openapi::api::core::v1::NamespaceStatus;

    fn owner() -> Rhmi {
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
        rhmi.metadata.uid = Some("uid-owner".to_string());
        rhmi
    }

    fn namespace(name: &str, phase: &str) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            status: Some(NamespaceStatus {
                phase: Some(phase.to_string()),
                ..NamespaceStatus::default()
            }),
            ..Namespace::default()
        }
    }

    #[tokio::test]
    async fn test_missing_namespace_is_created() {
        let cluster = InMemoryCluster::new();
        let phase = reconcile_namespace(&cluster, "redhat-rhoam-rhsso", &owner(), 3)
            .await
            .unwrap();
        assert_eq!(phase, StatusPhase::Completed);
        let created: Namespace = cluster.object(None, "redhat-rhoam-rhsso").unwrap();
        assert_eq!(
            created.metadata.labels.unwrap()["integreatly.org/installation-uid"],
            "uid-owner"
        );
    }

    #[tokio::test]
    async fn test_terminating_namespace_waits() {
        let cluster = InMemoryCluster::new();
        cluster.seed(&namespace("ns", "Terminating")).unwrap();
        let phase = reconcile_namespace(&cluster, "ns", &owner(), 3).await.unwrap();
        assert_eq!(phase, StatusPhase::AwaitingComponents);
        assert_eq!(cluster.count(Verb::Update, "Namespace"), 0);
    }

    #[tokio::test]
    async fn test_active_namespace_is_relabelled_once() {
        let cluster = InMemoryCluster::new();
        cluster.seed(&namespace("ns", "Active")).unwrap();
        let owner = owner();
        assert_eq!(
            reconcile_namespace(&cluster, "ns", &owner, 3).await.unwrap(),
            StatusPhase::Completed
        );
        assert_eq!(
            reconcile_namespace(&cluster, "ns", &owner, 3).await.unwrap(),
            StatusPhase::Completed
        );
        assert_eq!(cluster.count(Verb::Update, "Namespace"), 1);
    }

    #[tokio::test]
    async fn test_delete_namespace_reports_completion() {
        let cluster = InMemoryCluster::new();
        cluster.seed(&namespace("ns", "Active")).unwrap();
        assert_eq!(
            delete_namespace(&cluster, "ns").await.unwrap(),
            StatusPhase::Completed
        );
        assert_eq!(
            delete_namespace(&cluster, "ns").await.unwrap(),
            StatusPhase::Completed
        );
    }
}
