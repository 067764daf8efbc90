//! # Config Store
//!
//! Per-product key/value configuration persisted in one shared ConfigMap. Each product
//! owns one entry, keyed by product name, holding its values encoded as a YAML map.
//!
//! Writers never hold the record: every write re-reads the latest copy, replaces only
//! its own entry and writes the whole record back, retrying on resource version
//! conflicts.

use crate::cluster::typed::{self, Subresource};
use crate::cluster::{ClusterClient, ClusterError};
use crate::crd::ProductName;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const KEY_NAMESPACE: &str = "NAMESPACE";
pub const KEY_OPERATOR_NAMESPACE: &str = "OPERATOR_NAMESPACE";
pub const KEY_HOST: &str = "HOST";
pub const KEY_VERSION: &str = "VERSION";
pub const KEY_OPERATOR_VERSION: &str = "OPERATOR_VERSION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to decode product config for {product}: {message}")]
    Decode { product: ProductName, message: String },
    #[error("failed to encode product config for {product}: {message}")]
    Encode { product: ProductName, message: String },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ConfigError {
    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigError::Decode { .. } => "config_decode",
            ConfigError::Encode { .. } => "config_encode",
            ConfigError::Cluster(e) => e.as_str(),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            ConfigError::Cluster(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Configuration of one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductConfig {
    product: ProductName,
    values: BTreeMap<String, String>,
}

impl ProductConfig {
    pub fn new(product: ProductName) -> Self {
        Self {
            product,
            values: BTreeMap::new(),
        }
    }

    pub fn from_values(product: ProductName, values: BTreeMap<String, String>) -> Self {
        Self { product, values }
    }

    pub fn product(&self) -> ProductName {
        self.product
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Value of `key`, `None` when unset or empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn namespace(&self) -> Option<&str> {
        self.get(KEY_NAMESPACE)
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.set(KEY_NAMESPACE, namespace);
    }

    pub fn operator_namespace(&self) -> Option<&str> {
        self.get(KEY_OPERATOR_NAMESPACE)
    }

    pub fn set_operator_namespace(&mut self, namespace: impl Into<String>) {
        self.set(KEY_OPERATOR_NAMESPACE, namespace);
    }

    pub fn host(&self) -> Option<&str> {
        self.get(KEY_HOST)
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.set(KEY_HOST, host);
    }

    pub fn version(&self) -> Option<&str> {
        self.get(KEY_VERSION)
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.set(KEY_VERSION, version);
    }

    pub fn operator_version(&self) -> Option<&str> {
        self.get(KEY_OPERATOR_VERSION)
    }

    pub fn set_operator_version(&mut self, version: impl Into<String>) {
        self.set(KEY_OPERATOR_VERSION, version);
    }

    fn encode(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values).map_err(|e| ConfigError::Encode {
            product: self.product,
            message: e.to_string(),
        })
    }

    fn decode(product: ProductName, raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::new(product));
        }
        let values: Option<BTreeMap<String, String>> =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Decode {
                product,
                message: e.to_string(),
            })?;
        Ok(Self::from_values(product, values.unwrap_or_default()))
    }
}

/// Reads and writes product configuration in the shared record
#[derive(Clone)]
pub struct ConfigManager {
    client: Arc<dyn ClusterClient>,
    namespace: String,
    name: String,
    retries: u32,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .finish()
    }
}

impl ConfigManager {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        retries: u32,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
            retries: retries.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Configuration of `product`, empty when the record or its entry does not exist
    pub async fn read_product(&self, product: ProductName) -> Result<ProductConfig, ConfigError> {
        let record: Option<ConfigMap> =
            typed::get_opt(&*self.client, Some(&self.namespace), &self.name).await?;
        let raw = record
            .and_then(|cm| cm.data)
            .and_then(|mut data| data.remove(product.as_str()))
            .unwrap_or_default();
        ProductConfig::decode(product, &raw)
    }

    /// Persist `config` as its product's entry, creating the record when missing
    pub async fn write_config(&self, config: &ProductConfig) -> Result<(), ConfigError> {
        let key = config.product.as_str().to_string();
        let encoded = config.encode()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let updated: Option<ConfigMap> = typed::modify(
                &*self.client,
                Some(&self.namespace),
                &self.name,
                Subresource::Main,
                self.retries,
                |record: &mut ConfigMap| {
                    let data = record.data.get_or_insert_with(BTreeMap::new);
                    if data.get(&key) == Some(&encoded) {
                        return false;
                    }
                    data.insert(key.clone(), encoded.clone());
                    true
                },
            )
            .await?;
            if updated.is_some() {
                return Ok(());
            }

            let record = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(self.name.clone()),
                    namespace: Some(self.namespace.clone()),
                    ..ObjectMeta::default()
                },
                data: Some(BTreeMap::from([(key.clone(), encoded.clone())])),
                ..ConfigMap::default()
            };
            match typed::create(&*self.client, &record).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_already_exists() && attempt < self.retries => {
                    debug!(record = %self.name, "Config record created concurrently, retrying write");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove the whole record
    pub async fn delete(&self) -> Result<(), ConfigError> {
        typed::delete::<ConfigMap>(&*self.client, Some(&self.namespace), &self.name).await?;
        Ok(())
    }
}
