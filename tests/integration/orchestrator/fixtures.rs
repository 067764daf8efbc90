//! Shared fixtures: a scripted product reconciler and a harness running full passes

use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use rhmi_operator::cluster::typed::{self, Subresource};
use rhmi_operator::cluster::{ClusterClient, EventRecorder, InMemoryCluster, MemoryRecorder};
use rhmi_operator::config::{ControllerConfig, Platform};
use rhmi_operator::crd::{ProductName, ProductStatus, Rhmi, RhmiSpec, RhmiStatus, StatusPhase};
use rhmi_operator::installation::bootstrap::{
    route_resource, CONSOLE_ROUTE_NAME, CONSOLE_ROUTE_NAMESPACE,
};
use rhmi_operator::installation::{reconcile_installation, Orchestrator};
use rhmi_operator::marketplace::MarketplaceManager;
use rhmi_operator::products::{
    ProductConstructor, ProductContext, ProductReconciler, ReconcileError, ReconcilerRegistry,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "redhat-rhmi-operator";
pub const NAME: &str = "rhoam";
pub const CONSOLE_HOST: &str = "console-openshift-console.apps.example.com";

/// What each product reports, and which products were reconciled
#[derive(Debug, Default)]
pub struct Script {
    phases: Mutex<HashMap<ProductName, StatusPhase>>,
    failures: Mutex<HashMap<ProductName, String>>,
    calls: Mutex<Vec<ProductName>>,
}

impl Script {
    /// Make `product` report `phase`; products report `Completed` otherwise
    pub fn set(&self, product: ProductName, phase: StatusPhase) {
        self.phases.lock().unwrap().insert(product, phase);
    }

    pub fn fail(&self, product: ProductName, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(product, message.to_string());
    }

    pub fn calls(&self) -> Vec<ProductName> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

struct ScriptedReconciler {
    product: ProductName,
    script: Arc<Script>,
}

#[async_trait]
impl ProductReconciler for ScriptedReconciler {
    fn product(&self) -> ProductName {
        self.product
    }

    fn verify_version(&self, _installation: &Rhmi) -> bool {
        true
    }

    async fn reconcile(
        &self,
        installation: &Rhmi,
        _status: &mut ProductStatus,
        client: &dyn ClusterClient,
    ) -> Result<StatusPhase, ReconcileError> {
        self.script.calls.lock().unwrap().push(self.product);
        if let Some(message) = self.script.failures.lock().unwrap().get(&self.product) {
            return Err(ReconcileError::Failed(message.clone()));
        }
        let phase = self
            .script
            .phases
            .lock()
            .unwrap()
            .get(&self.product)
            .copied()
            .unwrap_or(StatusPhase::Completed);

        // A removed product lets go of the installation
        if phase.is_completed() && installation.is_being_deleted() {
            let finalizer = self.product.finalizer();
            typed::modify::<Rhmi, _>(
                client,
                installation.namespace().as_deref(),
                &installation.name_any(),
                Subresource::Main,
                3,
                |rhmi| {
                    let before = rhmi.finalizers().len();
                    rhmi.finalizers_mut().retain(|f| *f != finalizer);
                    rhmi.finalizers().len() != before
                },
            )
            .await?;
        }
        Ok(phase)
    }
}

struct ScriptedConstructor {
    product: ProductName,
    script: Arc<Script>,
}

#[async_trait]
impl ProductConstructor for ScriptedConstructor {
    async fn build(
        &self,
        _installation: &Rhmi,
        _context: &ProductContext,
    ) -> Result<Box<dyn ProductReconciler>, ReconcileError> {
        Ok(Box::new(ScriptedReconciler {
            product: self.product,
            script: Arc::clone(&self.script),
        }))
    }
}

pub fn installation(flavor: &str) -> Rhmi {
    let mut rhmi = Rhmi::new(
        NAME,
        RhmiSpec {
            installation_type: flavor.to_string(),
            namespace_prefix: "redhat-rhoam-".to_string(),
            routing_subdomain: None,
            master_url: None,
            self_signed_certs: false,
            pull_secret: None,
        },
    );
    rhmi.metadata.namespace = Some(NAMESPACE.to_string());
    rhmi
}

pub fn product_status(product: ProductName, phase: StatusPhase) -> (ProductName, ProductStatus) {
    let mut status = ProductStatus::new(product);
    status.phase = phase;
    (product, status)
}

/// Orchestrator wired to the in-memory cluster on AWS
pub struct Harness {
    pub cluster: Arc<InMemoryCluster>,
    pub recorder: Arc<MemoryRecorder>,
    pub script: Arc<Script>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let recorder = Arc::new(MemoryRecorder::new());
        let script = Arc::new(Script::default());

        let mut registry = ReconcilerRegistry::new();
        for product in ProductName::ALL {
            registry.register(
                product,
                Arc::new(ScriptedConstructor {
                    product,
                    script: Arc::clone(&script),
                }),
            );
        }

        let client: Arc<dyn ClusterClient> = cluster.clone();
        let events: Arc<dyn EventRecorder> = recorder.clone();
        let orchestrator = Arc::new(Orchestrator::new(
            client,
            Arc::new(MarketplaceManager::new()),
            events,
            Arc::new(registry),
            Arc::new(ControllerConfig::default()),
            Platform::Aws,
        ));
        Self {
            cluster,
            recorder,
            script,
            orchestrator,
        }
    }

    pub async fn seed_console_route(&self) {
        let mut route = DynamicObject::new(CONSOLE_ROUTE_NAME, &route_resource())
            .within(CONSOLE_ROUTE_NAMESPACE);
        route.data = serde_json::json!({
            "status": {"ingress": [{
                "host": CONSOLE_HOST,
                "routerCanonicalHostname": "router-default.apps.example.com"
            }]}
        });
        self.cluster
            .create(&route_resource(), &route)
            .await
            .expect("console route is created");
    }

    pub fn seed(&self, installation: &Rhmi) {
        self.cluster.seed(installation).expect("installation is seeded");
    }

    pub fn stored(&self) -> Option<Rhmi> {
        self.cluster.object(Some(NAMESPACE), NAME)
    }

    pub fn status(&self) -> RhmiStatus {
        self.stored()
            .and_then(|rhmi| rhmi.status)
            .unwrap_or_default()
    }

    /// One pass over the stored installation, as the controller runtime would run it
    pub async fn pass(&self) -> Action {
        let current = self.stored().expect("installation exists");
        reconcile_installation(Arc::new(current), Arc::clone(&self.orchestrator))
            .await
            .expect("pass completes")
    }
}
