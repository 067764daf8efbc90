//! A cluster with the operator installed and an upgrade pending

use rhmi_operator::cluster::{ClusterClient, EventRecorder, InMemoryCluster, MemoryRecorder};
use rhmi_operator::config::ControllerConfig;
use rhmi_operator::constants::RHMI_CONFIG_NAME;
use rhmi_operator::crd::{
    Maintenance, Rhmi, RhmiConfig, RhmiConfigSpec, RhmiSpec, RhmiStatus, Upgrade,
};
use rhmi_operator::olm::{
    Approval, InstallPlan, InstallPlanPhase, InstallPlanReference, InstallPlanSpec,
    InstallPlanStatus, Step, StepResource, Subscription, SubscriptionSpec, SubscriptionStatus,
};
use rhmi_operator::upgrade::UpgradeContext;
use std::sync::Arc;

pub const NAMESPACE: &str = "redhat-rhmi-operator";
pub const PLAN: &str = "install-xyz";
pub const INSTALLED_CSV: &str = "integreatly-operator.v2.4.0";
pub const NEXT_CSV: &str = "integreatly-operator.v2.5.0";

pub struct UpgradeHarness {
    pub cluster: Arc<InMemoryCluster>,
    pub recorder: Arc<MemoryRecorder>,
    pub ctx: Arc<UpgradeContext>,
}

impl UpgradeHarness {
    pub fn new() -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let recorder = Arc::new(MemoryRecorder::new());
        let client: Arc<dyn ClusterClient> = cluster.clone();
        let events: Arc<dyn EventRecorder> = recorder.clone();
        let ctx = Arc::new(UpgradeContext::new(
            client,
            events,
            Arc::new(ControllerConfig::default()),
        ));
        Self {
            cluster,
            recorder,
            ctx,
        }
    }

    /// Seed the installation, its upgrade schedule and a pending install plan
    pub fn seed(&self, upgrade: Upgrade, service_affecting: bool) {
        let mut rhmi = Rhmi::new(
            "rhoam",
            RhmiSpec {
                installation_type: "managed-api".to_string(),
                namespace_prefix: "redhat-rhoam-".to_string(),
                routing_subdomain: None,
                master_url: None,
                self_signed_certs: false,
                pull_secret: None,
            },
        );
        rhmi.metadata.namespace = Some(NAMESPACE.to_string());
        rhmi.status = Some(RhmiStatus {
            version: Some("2.4.0".to_string()),
            ..RhmiStatus::default()
        });
        self.cluster.seed(&rhmi).unwrap();

        let mut config = RhmiConfig::new(
            RHMI_CONFIG_NAME,
            RhmiConfigSpec {
                upgrade,
                maintenance: Maintenance {
                    apply_from: Some("Thu 02:00".to_string()),
                },
                ..RhmiConfigSpec::default()
            },
        );
        config.metadata.namespace = Some(NAMESPACE.to_string());
        self.cluster.seed(&config).unwrap();

        self.cluster.seed(&install_plan(service_affecting)).unwrap();
    }

    pub fn plan(&self) -> InstallPlan {
        self.cluster.object(Some(NAMESPACE), PLAN).unwrap()
    }

    pub fn installation(&self) -> Rhmi {
        self.cluster.object(Some(NAMESPACE), "rhoam").unwrap()
    }

    pub fn config(&self) -> RhmiConfig {
        self.cluster.object(Some(NAMESPACE), RHMI_CONFIG_NAME).unwrap()
    }
}

fn install_plan(service_affecting: bool) -> InstallPlan {
    let mut csv = serde_json::json!({
        "apiVersion": "operators.coreos.com/v1alpha1",
        "kind": "ClusterServiceVersion",
        "metadata": {"name": NEXT_CSV, "namespace": NAMESPACE},
        "spec": {"version": "2.5.0", "replaces": INSTALLED_CSV}
    });
    if !service_affecting {
        csv["metadata"]["annotations"] = serde_json::json!({"serviceAffecting": "false"});
    }

    let mut plan = InstallPlan::new(
        PLAN,
        InstallPlanSpec {
            cluster_service_version_names: vec![NEXT_CSV.to_string()],
            approval: Approval::Manual,
            approved: false,
        },
    );
    plan.metadata.namespace = Some(NAMESPACE.to_string());
    plan.status = Some(InstallPlanStatus {
        phase: InstallPlanPhase::RequiresApproval,
        plan: vec![Step {
            resource: StepResource {
                kind: "ClusterServiceVersion".to_string(),
                name: NEXT_CSV.to_string(),
                manifest: Some(csv.to_string()),
            },
        }],
    });
    plan
}

/// The operator's own subscription, with `NEXT_CSV` waiting for approval
pub fn subscription(name: &str, approval: Approval) -> Subscription {
    let mut subscription = Subscription::new(
        name,
        SubscriptionSpec {
            source: "rhmi-operators".to_string(),
            source_namespace: "openshift-marketplace".to_string(),
            name: name.to_string(),
            channel: Some("rhmi".to_string()),
            install_plan_approval: Some(approval),
            starting_csv: None,
        },
    );
    subscription.metadata.namespace = Some(NAMESPACE.to_string());
    subscription.status = Some(SubscriptionStatus {
        current_csv: Some(NEXT_CSV.to_string()),
        installed_csv: Some(INSTALLED_CSV.to_string()),
        install_plan_ref: Some(InstallPlanReference {
            name: PLAN.to_string(),
            namespace: NAMESPACE.to_string(),
        }),
    });
    subscription
}
