//! # Typed Access
//!
//! Typed wrappers around [`ClusterClient`] plus read-modify-write helpers that retry on
//! resource version conflicts.

use super::{ClusterClient, ClusterError, Labels};
use kube::core::{ApiResource, DynamicObject};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Bound required of every typed resource
pub trait ClusterResource:
    Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync
{
}

impl<K> ClusterResource for K where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync
{
}

pub fn api_resource<K: ClusterResource>() -> ApiResource {
    ApiResource::erase::<K>(&())
}

pub fn to_dynamic<K: ClusterResource>(object: &K) -> Result<DynamicObject, ClusterError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| ClusterError::serialization(&K::kind(&()), &e))
}

pub fn from_dynamic<K: ClusterResource>(object: DynamicObject) -> Result<K, ClusterError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| ClusterError::serialization(&K::kind(&()), &e))
}

pub async fn get<K: ClusterResource>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<K, ClusterError> {
    let object = client.get(&api_resource::<K>(), namespace, name).await?;
    from_dynamic(object)
}

/// Get an object, mapping "not found" to `None`
pub async fn get_opt<K: ClusterResource>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>, ClusterError> {
    match get(client, namespace, name).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn list<K: ClusterResource>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    labels: &Labels,
) -> Result<Vec<K>, ClusterError> {
    client
        .list(&api_resource::<K>(), namespace, labels)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

pub async fn create<K: ClusterResource>(
    client: &dyn ClusterClient,
    object: &K,
) -> Result<K, ClusterError> {
    let created = client
        .create(&api_resource::<K>(), &to_dynamic(object)?)
        .await?;
    from_dynamic(created)
}

pub async fn update<K: ClusterResource>(
    client: &dyn ClusterClient,
    object: &K,
) -> Result<K, ClusterError> {
    let updated = client
        .update(&api_resource::<K>(), &to_dynamic(object)?)
        .await?;
    from_dynamic(updated)
}

pub async fn update_status<K: ClusterResource>(
    client: &dyn ClusterClient,
    object: &K,
) -> Result<K, ClusterError> {
    let updated = client
        .update_status(&api_resource::<K>(), &to_dynamic(object)?)
        .await?;
    from_dynamic(updated)
}

/// Delete an object, treating "not found" as already deleted
pub async fn delete<K: ClusterResource>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
) -> Result<(), ClusterError> {
    match client.delete(&api_resource::<K>(), namespace, name).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Which part of an object a read-modify-write replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subresource {
    Main,
    Status,
}

/// Read the latest version of an object, mutate it and write it back
///
/// `mutate` returns whether it changed anything; unchanged objects are not written.
/// On a resource version conflict the whole cycle is repeated, up to `attempts` times.
/// Returns `None` when the object does not exist.
pub async fn modify<K, F>(
    client: &dyn ClusterClient,
    namespace: Option<&str>,
    name: &str,
    subresource: Subresource,
    attempts: u32,
    mut mutate: F,
) -> Result<Option<K>, ClusterError>
where
    K: ClusterResource,
    F: FnMut(&mut K) -> bool + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(mut latest) = get_opt::<K>(client, namespace, name).await? else {
            return Ok(None);
        };
        if !mutate(&mut latest) {
            return Ok(Some(latest));
        }
        let written = match subresource {
            Subresource::Main => update(client, &latest).await,
            Subresource::Status => update_status(client, &latest).await,
        };
        match written {
            Ok(object) => return Ok(Some(object)),
            Err(e) if e.is_conflict() && attempt < attempts.max(1) => {
                debug!(
                    kind = %K::kind(&()),
                    name,
                    attempt,
                    "Resource version conflict, retrying read-modify-write"
                );
            }
            Err(e) => return Err(e),
        }
    }
}
