//! # Kubernetes Cluster Client
//!
//! [`ClusterClient`] backed by a `kube::Client`.

use super::{ClusterClient, ClusterError, Labels};
use crate::constants::CONTROLLER_NAME;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::Client;

/// Cluster client talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

fn object_name(object: &DynamicObject) -> &str {
    object.metadata.name.as_deref().unwrap_or_default()
}

fn label_selector(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        self.api(resource, namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, &resource.kind, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        labels: &Labels,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let mut params = ListParams::default();
        if !labels.is_empty() {
            params = params.labels(&label_selector(labels));
        }
        self.api(resource, namespace)
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| ClusterError::from_kube(e, &resource.kind, ""))
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let name = object_name(object);
        self.api(resource, object.metadata.namespace.as_deref())
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| ClusterError::from_kube(e, &resource.kind, name))
    }

    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let name = object_name(object);
        self.api(resource, object.metadata.namespace.as_deref())
            .replace(name, &PostParams::default(), object)
            .await
            .map_err(|e| ClusterError::from_kube(e, &resource.kind, name))
    }

    async fn update_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let name = object_name(object);
        // The resource version makes the merge patch conditional on the object not having
        // changed since it was read.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": object.metadata.resource_version },
            "status": object.data.get("status").cloned().unwrap_or_default(),
        });
        self.api(resource, object.metadata.namespace.as_deref())
            .patch_status(name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(patch))
            .await
            .map_err(|e| ClusterError::from_kube(e, &resource.kind, name))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ClusterError> {
        self.api(resource, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::from_kube(e, &resource.kind, name))
    }
}
