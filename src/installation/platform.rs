//! # Platform Detection

use crate::cluster::ClusterClient;
use crate::config::Platform;
use kube::core::{ApiResource, GroupVersionKind};
use tracing::{debug, warn};

const INFRASTRUCTURE_NAME: &str = "cluster";

fn infrastructure_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("config.openshift.io", "v1", "Infrastructure"),
        "infrastructures",
    )
}

/// Platform the cluster runs on, from the cluster-wide Infrastructure object
///
/// `forced` wins when set. A missing or unreadable Infrastructure object means
/// [`Platform::Other`].
pub async fn detect_platform(client: &dyn ClusterClient, forced: Option<Platform>) -> Platform {
    if let Some(platform) = forced {
        return platform;
    }
    match client
        .get(&infrastructure_resource(), None, INFRASTRUCTURE_NAME)
        .await
    {
        Ok(infrastructure) => {
            let platform = infrastructure
                .data
                .pointer("/status/platformStatus/type")
                .and_then(|t| t.as_str())
                .and_then(|t| t.parse().ok())
                .unwrap_or(Platform::Other);
            debug!(?platform, "Detected cluster platform");
            platform
        }
        Err(e) => {
            warn!(error = %e, "Could not read cluster infrastructure, assuming no platform-specific products");
            Platform::Other
        }
    }
}
