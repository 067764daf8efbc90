use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::{Rhmi, StatusPhase};
use kube::ResourceExt;
use std::future::Future;
use tracing::info;

/// Hold `finalizer` on the installation and run `cleanup` before releasing it
///
/// While the installation is live the key is added if missing. Once it is marked for
/// deletion `cleanup` is called on every pass until it reports `Completed`, and only
/// then is the key removed. A pass that finds the key already gone returns `Completed`
/// without calling `cleanup`, so cleanup finishes exactly once even across restarts.
pub async fn reconcile_finalizer<F, Fut, E>(
    client: &dyn ClusterClient,
    owner: &Rhmi,
    finalizer: &str,
    retries: u32,
    cleanup: F,
) -> Result<StatusPhase, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<StatusPhase, E>>,
    E: From<ClusterError>,
{
    let name = owner.name_any();
    let namespace = owner.namespace();
    let Some(latest) = typed::get_opt::<Rhmi>(client, namespace.as_deref(), &name).await? else {
        return Ok(StatusPhase::Completed);
    };

    if latest.is_being_deleted() {
        if !latest.has_finalizer(finalizer) {
            return Ok(StatusPhase::Completed);
        }
        let phase = cleanup().await?;
        if !phase.is_completed() {
            return Ok(phase);
        }
        typed::modify::<Rhmi, _>(
            client,
            namespace.as_deref(),
            &name,
            Subresource::Main,
            retries,
            |rhmi| {
                let before = rhmi.finalizers().len();
                rhmi.finalizers_mut().retain(|f| f != finalizer);
                rhmi.finalizers().len() != before
            },
        )
        .await?;
        info!(installation = %name, finalizer, "Removed finalizer");
        return Ok(StatusPhase::Completed);
    }

    if !latest.has_finalizer(finalizer) {
        typed::modify::<Rhmi, _>(
            client,
            namespace.as_deref(),
            &name,
            Subresource::Main,
            retries,
            |rhmi| {
                if rhmi.has_finalizer(finalizer) {
                    return false;
                }
                rhmi.finalizers_mut().push(finalizer.to_string());
                true
            },
        )
        .await?;
        info!(installation = %name, finalizer, "Added finalizer");
    }
    Ok(StatusPhase::Completed)
}
