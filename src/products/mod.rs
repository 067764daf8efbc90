//! # Products
//!
//! Every product of the suite is driven by a [`ProductReconciler`]. The orchestrator
//! never knows concrete reconciler types: it asks the [`ReconcilerRegistry`] to build one
//! for a product name, so new products are added by registering a constructor.
//!
//! ## Contract
//!
//! A call to [`ProductReconciler::reconcile`]:
//!
//! - is idempotent: with nothing changed in the cluster it writes nothing and returns
//!   the same phase
//! - never waits for the cluster to converge; waiting is an unfinished phase
//! - only advances the phase on success, regressing only through an error
//! - returns errors instead of retrying internally
//! - touches only its own status entry and its own namespaces
//!
//! An error is treated as `Failed` by the orchestrator unless it is transient.

mod declaration;
mod error;
mod operator;

pub use declaration::{declaration, HostPattern, OperatorPackage, ProductDeclaration, DECLARATIONS};
pub use error::ReconcileError;
pub use operator::{OperatorProductConstructor, OperatorProductReconciler};

use crate::cluster::{ClusterClient, EventRecorder};
use crate::config_store::ConfigManager;
use crate::crd::{ProductName, ProductStatus, Rhmi, StatusPhase};
use crate::marketplace::PackageInstaller;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ProductReconciler: Send + Sync {
    fn product(&self) -> ProductName;

    /// Whether the installation records the versions this reconciler installs
    fn verify_version(&self, installation: &Rhmi) -> bool;

    /// Do one step towards the desired state (or towards removal while the installation
    /// is being deleted), updating `status` with what was discovered
    async fn reconcile(
        &self,
        installation: &Rhmi,
        status: &mut ProductStatus,
        client: &dyn ClusterClient,
    ) -> Result<StatusPhase, ReconcileError>;
}

/// Collaborators shared by every product reconciler
#[derive(Clone)]
pub struct ProductContext {
    pub client: Arc<dyn ClusterClient>,
    pub config_manager: ConfigManager,
    pub installer: Arc<dyn PackageInstaller>,
    pub recorder: Arc<dyn EventRecorder>,
    /// Attempts for read-modify-write updates on conflict
    pub retries: u32,
}

impl std::fmt::Debug for ProductContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductContext")
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Builds the reconciler of one product for one installation
#[async_trait]
pub trait ProductConstructor: Send + Sync {
    /// Fails when the product configuration is invalid
    async fn build(
        &self,
        installation: &Rhmi,
        context: &ProductContext,
    ) -> Result<Box<dyn ProductReconciler>, ReconcileError>;
}

/// Product name to reconciler constructor
#[derive(Clone, Default)]
pub struct ReconcilerRegistry {
    constructors: HashMap<ProductName, Arc<dyn ProductConstructor>>,
}

impl std::fmt::Debug for ReconcilerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut products: Vec<&ProductName> = self.constructors.keys().collect();
        products.sort();
        f.debug_struct("ReconcilerRegistry")
            .field("products", &products)
            .finish()
    }
}

impl ReconcilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the operator-backed reconciler of every declared product
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for declaration in &DECLARATIONS {
            registry.register(
                declaration.product,
                Arc::new(OperatorProductConstructor::new(*declaration)),
            );
        }
        registry
    }

    /// Register `constructor` for `product`, replacing any previous one
    pub fn register(&mut self, product: ProductName, constructor: Arc<dyn ProductConstructor>) {
        self.constructors.insert(product, constructor);
    }

    pub fn is_registered(&self, product: ProductName) -> bool {
        self.constructors.contains_key(&product)
    }

    pub async fn build(
        &self,
        product: ProductName,
        installation: &Rhmi,
        context: &ProductContext,
    ) -> Result<Box<dyn ProductReconciler>, ReconcileError> {
        let constructor = self
            .constructors
            .get(&product)
            .ok_or(ReconcileError::NotRegistered(product))?;
        constructor.build(installation, context).await
    }
}
