//! # In-Memory Cluster
//!
//! [`ClusterClient`] that keeps objects in process. It follows the API server rules the
//! operator depends on:
//!
//! - every write bumps the resource version, and writes carrying a stale one conflict
//! - `update` never changes status and `update_status` never changes anything else
//! - deleting an object with finalizers only marks it for deletion; it disappears once
//!   the last finalizer is removed
//!
//! Every request is recorded so tests can assert on what was (not) called.

use super::typed::{to_dynamic, ClusterResource};
use super::{ClusterClient, ClusterError, Labels};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::{ApiResource, DynamicObject, TypeMeta};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Kind of request made against the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// One recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub verb: Verb,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

type ObjectKey = (String, String, Option<String>, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    revision: u64,
    operations: Vec<Operation>,
    failures: Vec<(Verb, String, ClusterError)>,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    fn record(&mut self, verb: Verb, kind: &str, namespace: Option<&str>, name: &str) {
        self.operations.push(Operation {
            verb,
            kind: kind.to_string(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        });
    }

    fn take_failure(&mut self, verb: Verb, kind: &str) -> Option<ClusterError> {
        let index = self
            .failures
            .iter()
            .position(|(v, k, _)| *v == verb && k == kind)?;
        Some(self.failures.remove(index).2)
    }
}

/// Cluster client holding objects in memory
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

fn key(resource: &ApiResource, namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        resource.api_version.clone(),
        resource.kind.clone(),
        namespace.map(str::to_string),
        name.to_string(),
    )
}

fn now() -> Option<Time> {
    let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    serde_json::from_value(serde_json::Value::String(stamp)).ok()
}

fn conflict(resource: &ApiResource, name: &str) -> ClusterError {
    ClusterError::Conflict {
        kind: resource.kind.clone(),
        name: name.to_string(),
        message: "the object has been modified; please apply your changes to the latest version"
            .to_string(),
    }
}

fn set_status(object: &mut DynamicObject, status: Option<serde_json::Value>) {
    if !object.data.is_object() {
        object.data = serde_json::Value::Object(serde_json::Map::new());
    }
    if let Some(map) = object.data.as_object_mut() {
        match status {
            Some(status) => {
                map.insert("status".to_string(), status);
            }
            None => {
                map.remove("status");
            }
        }
    }
}

fn has_finalizers(object: &DynamicObject) -> bool {
    object
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| !f.is_empty())
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object as-is, status included, bypassing request rules
    pub fn seed<K: ClusterResource>(&self, object: &K) -> Result<(), ClusterError> {
        let resource = super::typed::api_resource::<K>();
        let mut dynamic = to_dynamic(object)?;
        let mut state = self.lock();
        let name = dynamic.metadata.name.clone().unwrap_or_default();
        let namespace = dynamic.metadata.namespace.clone();
        dynamic.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        dynamic.metadata.resource_version = Some(state.next_revision());
        if dynamic.metadata.uid.is_none() {
            dynamic.metadata.uid = Some(format!("uid-{}", state.revision));
        }
        if dynamic.metadata.creation_timestamp.is_none() {
            dynamic.metadata.creation_timestamp = now();
        }
        state
            .objects
            .insert(key(&resource, namespace.as_deref(), &name), dynamic);
        Ok(())
    }

    /// Typed copy of a stored object, without recording a request
    pub fn object<K: ClusterResource>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let resource = super::typed::api_resource::<K>();
        let object = self
            .lock()
            .objects
            .get(&key(&resource, namespace, name))
            .cloned()?;
        super::typed::from_dynamic(object).ok()
    }

    /// Make the next `verb` request against `kind` fail with `error`
    pub fn fail_next(&self, verb: Verb, kind: &str, error: ClusterError) {
        self.lock().failures.push((verb, kind.to_string(), error));
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Number of recorded `verb` requests against `kind`
    pub fn count(&self, verb: Verb, kind: &str) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| op.verb == verb && op.kind == kind)
            .count()
    }

    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        let mut state = self.lock();
        state.record(Verb::Get, &resource.kind, namespace, name);
        if let Some(err) = state.take_failure(Verb::Get, &resource.kind) {
            return Err(err);
        }
        state
            .objects
            .get(&key(resource, namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::not_found(&resource.kind, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        labels: &Labels,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let mut state = self.lock();
        state.record(Verb::List, &resource.kind, namespace, "");
        if let Some(err) = state.take_failure(Verb::List, &resource.kind) {
            return Err(err);
        }
        let items = state
            .objects
            .iter()
            .filter(|((api_version, kind, ns, _), _)| {
                *api_version == resource.api_version
                    && *kind == resource.kind
                    && namespace.is_none_or(|wanted| ns.as_deref() == Some(wanted))
            })
            .filter(|(_, object)| {
                let object_labels = object.metadata.labels.clone().unwrap_or_default();
                labels
                    .iter()
                    .all(|(k, v)| object_labels.get(k) == Some(v))
            })
            .map(|(_, object)| object.clone())
            .collect();
        Ok(items)
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let mut state = self.lock();
        let name = object.metadata.name.clone().unwrap_or_default();
        let namespace = object.metadata.namespace.clone();
        state.record(Verb::Create, &resource.kind, namespace.as_deref(), &name);
        if let Some(err) = state.take_failure(Verb::Create, &resource.kind) {
            return Err(err);
        }
        let object_key = key(resource, namespace.as_deref(), &name);
        if state.objects.contains_key(&object_key) {
            return Err(ClusterError::AlreadyExists {
                kind: resource.kind.clone(),
                name,
            });
        }
        let mut created = object.clone();
        created.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        created.metadata.resource_version = Some(state.next_revision());
        created.metadata.uid = Some(format!("uid-{}", state.revision));
        created.metadata.creation_timestamp = now();
        created.metadata.deletion_timestamp = None;
        state.objects.insert(object_key, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let mut state = self.lock();
        let name = object.metadata.name.clone().unwrap_or_default();
        let namespace = object.metadata.namespace.clone();
        state.record(Verb::Update, &resource.kind, namespace.as_deref(), &name);
        if let Some(err) = state.take_failure(Verb::Update, &resource.kind) {
            return Err(err);
        }
        let object_key = key(resource, namespace.as_deref(), &name);
        let stored = state
            .objects
            .get(&object_key)
            .cloned()
            .ok_or_else(|| ClusterError::not_found(&resource.kind, &name))?;
        if object.metadata.resource_version.is_some()
            && object.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(conflict(resource, &name));
        }
        let mut updated = object.clone();
        updated.types = stored.types.clone();
        set_status(&mut updated, stored.data.get("status").cloned());
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.creation_timestamp = stored.metadata.creation_timestamp.clone();
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        updated.metadata.resource_version = Some(state.next_revision());
        if updated.metadata.deletion_timestamp.is_some() && !has_finalizers(&updated) {
            state.objects.remove(&object_key);
        } else {
            state.objects.insert(object_key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let mut state = self.lock();
        let name = object.metadata.name.clone().unwrap_or_default();
        let namespace = object.metadata.namespace.clone();
        state.record(Verb::UpdateStatus, &resource.kind, namespace.as_deref(), &name);
        if let Some(err) = state.take_failure(Verb::UpdateStatus, &resource.kind) {
            return Err(err);
        }
        let object_key = key(resource, namespace.as_deref(), &name);
        let mut stored = state
            .objects
            .get(&object_key)
            .cloned()
            .ok_or_else(|| ClusterError::not_found(&resource.kind, &name))?;
        if object.metadata.resource_version.is_some()
            && object.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(conflict(resource, &name));
        }
        set_status(&mut stored, object.data.get("status").cloned());
        stored.metadata.resource_version = Some(state.next_revision());
        state.objects.insert(object_key, stored.clone());
        Ok(stored)
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.record(Verb::Delete, &resource.kind, namespace, name);
        if let Some(err) = state.take_failure(Verb::Delete, &resource.kind) {
            return Err(err);
        }
        let object_key = key(resource, namespace, name);
        let Some(mut stored) = state.objects.get(&object_key).cloned() else {
            return Err(ClusterError::not_found(&resource.kind, name));
        };
        if has_finalizers(&stored) {
            if stored.metadata.deletion_timestamp.is_none() {
                stored.metadata.deletion_timestamp = now();
                stored.metadata.resource_version = Some(state.next_revision());
                state.objects.insert(object_key, stored);
            }
        } else {
            state.objects.remove(&object_key);
        }
        Ok(())
    }
}
