use super::labels::prepare_object_labels;
use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::{Rhmi, StatusPhase};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use tracing::debug;

/// Copy the installation's pull secret into `namespace` under the same name
///
/// Nothing is copied when the source secret does not exist.
pub async fn reconcile_pull_secret(
    client: &dyn ClusterClient,
    owner: &Rhmi,
    namespace: &str,
    retries: u32,
) -> Result<StatusPhase, ClusterError> {
    let source_ref = owner.pull_secret_ref();
    if source_ref.namespace == namespace {
        return Ok(StatusPhase::Completed);
    }
    let Some(source) =
        typed::get_opt::<Secret>(client, Some(&source_ref.namespace), &source_ref.name).await?
    else {
        debug!(
            secret = %source_ref.name,
            namespace = %source_ref.namespace,
            "Pull secret not found, skipping copy"
        );
        return Ok(StatusPhase::Completed);
    };

    let updated = typed::modify::<Secret, _>(
        client,
        Some(namespace),
        &source_ref.name,
        Subresource::Main,
        retries,
        |copy| {
            let mut changed = prepare_object_labels(&mut copy.metadata, owner);
            if copy.data != source.data || copy.type_ != source.type_ {
                copy.data = source.data.clone();
                copy.type_ = source.type_.clone();
                changed = true;
            }
            changed
        },
    )
    .await?;
    if updated.is_some() {
        return Ok(StatusPhase::Completed);
    }

    let mut copy = Secret {
        metadata: ObjectMeta {
            name: Some(source_ref.name.clone()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: source.data.clone(),
        type_: source.type_.clone(),
        ..Secret::default()
    };
    prepare_object_labels(&mut copy.metadata, owner);
    match typed::create(client, &copy).await {
        Ok(_) => debug!(namespace, "Copied pull secret"),
        Err(e) if e.is_already_exists() => {}
        Err(e) => return Err(e),
    }
    Ok(StatusPhase::Completed)
}
