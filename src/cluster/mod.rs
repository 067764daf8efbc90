//! # Cluster Client
//!
//! The operator reaches the cluster API through [`ClusterClient`], an object-safe
//! capability over dynamic objects. Typed access goes through the helpers in [`typed`],
//! which convert to and from the concrete resource types.
//!
//! - [`KubeCluster`] talks to a real API server
//! - [`InMemoryCluster`] keeps objects in process, used by tests and local runs

mod error;
pub mod events;
mod kube_client;
mod memory;
pub mod typed;

pub use error::ClusterError;
pub use events::{EventRecorder, KubeEventRecorder, MemoryRecorder, RecordedEvent};
pub use kube_client::KubeCluster;
pub use memory::{InMemoryCluster, Operation, Verb};

use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject};
use std::collections::BTreeMap;

/// Equality label selector used to filter list results
pub type Labels = BTreeMap<String, String>;

/// Generic object access: get/list/create/update/delete and independent status updates
///
/// Create and update take the target namespace from the object's metadata. Updates are
/// conditional on the object's resource version when one is set.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError>;

    /// List objects, across all namespaces when `namespace` is `None`
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        labels: &Labels,
    ) -> Result<Vec<DynamicObject>, ClusterError>;

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError>;

    /// Replace metadata and spec, leaving status untouched
    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError>;

    /// Replace status, leaving metadata and spec untouched
    async fn update_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError>;

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ClusterError>;
}
