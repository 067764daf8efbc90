//! # Orchestrator
//!
//! One orchestration pass over an installation.
//!
//! ## Install
//!
//! 1. Preflight checks, until they have passed once
//! 2. Hold the installation finalizer
//! 3. Walk the install stages in order. Every product of a stage is reconciled; the next
//!    stage only starts once every product of the current one is `Completed`
//! 4. Once all stages are complete, promote `toVersion` to `version`
//!
//! ## Uninstall
//!
//! Once the installation is marked for deletion the uninstall stages are walked the same
//! way, inside the cleanup of the installation finalizer, so the installation only goes
//! away after every uninstall stage has completed.
//!
//! A pass never waits: it records what it found in the status and asks to be requeued.

use super::bootstrap::reconcile_bootstrap;
use super::error::OrchestratorError;
use super::preflight::run_preflight_checks;
use super::types::{type_for_flavor, InstallationType, Stage};
use crate::cluster::events::reference_for;
use crate::cluster::{ClusterClient, EventRecorder};
use crate::config::{ControllerConfig, Platform};
use crate::config_store::ConfigManager;
use crate::constants::{
    EVENT_INSTALLATION_COMPLETED, EVENT_PREFLIGHT_CHECK_PASSED, EVENT_PROCESSING_ERROR,
    INSTALLATION_FINALIZER,
};
use crate::crd::{
    PreflightStatus, ProductName, ProductStatus, Rhmi, RhmiStatus, StageName, StageStatus,
    StatusPhase,
};
use crate::marketplace::PackageInstaller;
use crate::observability::metrics;
use crate::products::{ProductContext, ReconcileError, ReconcilerRegistry};
use crate::resources::reconcile_finalizer;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Result of one orchestration pass
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Overall phase of the installation after the pass
    pub phase: StatusPhase,
    /// When to run the next pass, `None` to wait for a change to the installation
    pub requeue_after: Option<Duration>,
    /// What went wrong during the pass, already recorded in the status
    pub error: Option<OrchestratorError>,
}

/// Drives installations through their stages
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn ClusterClient>,
    installer: Arc<dyn PackageInstaller>,
    recorder: Arc<dyn EventRecorder>,
    registry: Arc<ReconcilerRegistry>,
    config: Arc<ControllerConfig>,
    platform: Platform,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// Stage phase from the phases of its products
fn aggregate(products: &BTreeMap<ProductName, ProductStatus>) -> StatusPhase {
    if products.values().any(|p| p.phase.is_failed()) {
        StatusPhase::Failed
    } else if products.values().all(|p| p.phase.is_completed()) {
        StatusPhase::Completed
    } else {
        StatusPhase::InProgress
    }
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        installer: Arc<dyn PackageInstaller>,
        recorder: Arc<dyn EventRecorder>,
        registry: Arc<ReconcilerRegistry>,
        config: Arc<ControllerConfig>,
        platform: Platform,
    ) -> Self {
        Self {
            client,
            installer,
            recorder,
            registry,
            config,
            platform,
        }
    }

    pub fn client(&self) -> &Arc<dyn ClusterClient> {
        &self.client
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn product_context(&self, installation: &Rhmi) -> ProductContext {
        let namespace = installation
            .namespace()
            .unwrap_or_else(|| self.config.watch_namespace.clone());
        ProductContext {
            client: Arc::clone(&self.client),
            config_manager: ConfigManager::new(
                Arc::clone(&self.client),
                namespace,
                self.config
                    .config_map_name(&installation.spec.namespace_prefix),
                self.config.status_write_retries,
            ),
            installer: Arc::clone(&self.installer),
            recorder: Arc::clone(&self.recorder),
            retries: self.config.status_write_retries,
        }
    }

    fn in_progress(&self, phase: StatusPhase, error: Option<OrchestratorError>) -> ReconcileOutcome {
        ReconcileOutcome {
            phase,
            requeue_after: Some(self.config.requeue_in_progress()),
            error,
        }
    }

    async fn publish(&self, installation: &Rhmi, type_: EventType, reason: &str, note: String) {
        self.recorder
            .publish(&reference_for(installation), type_, reason, note)
            .await;
    }

    /// Run one pass over `installation`, recording progress in `status`
    ///
    /// `status` starts as the installation's stored status and is written back by the
    /// caller.
    pub async fn run(&self, installation: &Rhmi, status: &mut RhmiStatus) -> ReconcileOutcome {
        let installation_type =
            match type_for_flavor(&installation.spec.installation_type, self.platform) {
                Ok(installation_type) => installation_type,
                Err(e) => {
                    warn!(installation = %installation.name_any(), error = %e, "Cannot install");
                    status.last_error = Some(e.to_string());
                    return ReconcileOutcome {
                        phase: StatusPhase::Failed,
                        requeue_after: None,
                        error: Some(e.into()),
                    };
                }
            };
        let context = self.product_context(installation);

        if installation.is_being_deleted() {
            return self
                .run_uninstall(installation, status, &installation_type, &context)
                .await;
        }
        if status.preflight_status != Some(PreflightStatus::Successful) {
            return self
                .run_preflight(installation, status, &installation_type)
                .await;
        }
        self.run_install(installation, status, &installation_type, &context)
            .await
    }

    async fn run_preflight(
        &self,
        installation: &Rhmi,
        status: &mut RhmiStatus,
        installation_type: &InstallationType,
    ) -> ReconcileOutcome {
        info!(installation = %installation.name_any(), "Running preflight checks");
        status.stage = Some(StageName::PreflightChecks);
        match run_preflight_checks(&*self.client, installation, installation_type).await {
            Ok(outcome) if outcome.passed => {
                status.preflight_status = Some(PreflightStatus::Successful);
                self.publish(
                    installation,
                    EventType::Normal,
                    EVENT_PREFLIGHT_CHECK_PASSED,
                    outcome.message.clone(),
                )
                .await;
                status.preflight_message = Some(outcome.message);
                self.in_progress(StatusPhase::InProgress, None)
            }
            Ok(outcome) => {
                status.preflight_status = Some(PreflightStatus::Failed);
                status.preflight_message = Some(outcome.message);
                self.in_progress(StatusPhase::Failed, None)
            }
            Err(e) => {
                warn!(error = %e, "Error looking for existing deployments, will retry");
                self.in_progress(StatusPhase::InProgress, Some(e.into()))
            }
        }
    }

    async fn run_install(
        &self,
        installation: &Rhmi,
        status: &mut RhmiStatus,
        installation_type: &InstallationType,
        context: &ProductContext,
    ) -> ReconcileOutcome {
        // A deletion that lands between the watch event and this pass is left to the next
        // pass; the placeholder cleanup never completes so the finalizer stays.
        let held = reconcile_finalizer::<_, _, OrchestratorError>(
            &*self.client,
            installation,
            INSTALLATION_FINALIZER,
            self.config.status_write_retries,
            || async { Ok(StatusPhase::InProgress) },
        )
        .await;
        match held {
            Ok(phase) if phase.is_completed() => {}
            Ok(phase) => return self.in_progress(phase, None),
            Err(e) => return self.in_progress(StatusPhase::InProgress, Some(e)),
        }

        let started_at = status.stage;
        let suite_version = installation_type.flavor.suite_version();
        if status.to_version.is_none() && status.version.as_deref() != Some(suite_version) {
            info!(version = suite_version, "Installing suite version");
            status.to_version = Some(suite_version.to_string());
        }

        let mut current = installation.clone();
        let mut version_mismatch = false;
        let mut errors = Vec::new();
        let mut blocked = None;
        for stage in &installation_type.install_stages {
            status.stage = Some(stage.name);
            let (phase, error) = if stage.name == StageName::Bootstrap {
                self.bootstrap_stage(&mut current, status)
                    .instrument(info_span!("stage", stage = %stage.name))
                    .await
            } else {
                current.status = Some(status.clone());
                self.process_stage(&current, stage, status, context, &mut version_mismatch)
                    .instrument(info_span!("stage", stage = %stage.name))
                    .await
            };
            metrics::set_stage_phase(stage.name, phase);

            if let Some(error) = error {
                status.last_error = Some(error.to_string());
                if phase.is_failed() {
                    self.publish(
                        installation,
                        EventType::Warning,
                        EVENT_PROCESSING_ERROR,
                        format!("Failed to process stage {}: {error}", stage.name),
                    )
                    .await;
                }
                errors.push(error);
            }
            if !phase.is_completed() {
                debug!(stage = %stage.name, %phase, "Stage incomplete");
                blocked = Some(phase);
                break;
            }
        }

        if let Some(phase) = blocked {
            return self.in_progress(phase, OrchestratorError::combine(errors));
        }

        status.stage = Some(StageName::Complete);
        if !version_mismatch && status.to_version.as_deref() == Some(suite_version) {
            status.version = status.to_version.take();
            info!(version = suite_version, "Installation version updated");
        }
        if errors.is_empty() {
            status.last_error = None;
        }
        if started_at != Some(StageName::Complete) {
            info!(installation = %installation.name_any(), "Installation completed");
            self.publish(
                installation,
                EventType::Normal,
                EVENT_INSTALLATION_COMPLETED,
                format!(
                    "Installation of {} {suite_version} completed",
                    installation_type.flavor
                ),
            )
            .await;
        }
        ReconcileOutcome {
            phase: StatusPhase::Completed,
            requeue_after: Some(self.config.requeue_complete()),
            error: OrchestratorError::combine(errors),
        }
    }

    /// Bootstrap stage; `current` picks up the discovered URL and subdomain
    async fn bootstrap_stage(
        &self,
        current: &mut Rhmi,
        status: &mut RhmiStatus,
    ) -> (StatusPhase, Option<OrchestratorError>) {
        let result = reconcile_bootstrap(
            &*self.client,
            current,
            self.config.status_write_retries,
            self.config.cluster_api_timeout(),
        )
        .await;
        let (phase, error) = match result {
            Ok(updated) => {
                current.metadata = updated.metadata;
                current.spec = updated.spec;
                (StatusPhase::Completed, None)
            }
            Err(e) => {
                warn!(error = %e, "Bootstrap stage failed");
                (StatusPhase::Failed, Some(OrchestratorError::Bootstrap(e)))
            }
        };
        status.stages.insert(
            StageName::Bootstrap,
            StageStatus {
                name: StageName::Bootstrap,
                phase,
                products: BTreeMap::new(),
            },
        );
        (phase, error)
    }

    /// Reconcile every product of an install stage and record the stage status
    async fn process_stage(
        &self,
        installation: &Rhmi,
        stage: &Stage,
        status: &mut RhmiStatus,
        context: &ProductContext,
        version_mismatch: &mut bool,
    ) -> (StatusPhase, Option<OrchestratorError>) {
        let previous = status.stages.get(&stage.name);
        let retrying = previous.is_some_and(|s| s.phase.is_failed());
        let mut products = BTreeMap::new();
        let mut errors = Vec::new();

        for (product, placeholder) in &stage.products {
            let mut product_status = previous
                .and_then(|s| s.products.get(product))
                .cloned()
                .unwrap_or_else(|| placeholder.clone());
            if retrying && product_status.phase.is_completed() {
                debug!(%product, "Skipping completed product on retry");
                products.insert(*product, product_status);
                continue;
            }

            let result = self
                .reconcile_product(installation, stage.name, &mut product_status, context)
                .instrument(info_span!("product", product = %product))
                .await;
            metrics::set_product_phase(*product, product_status.phase);
            match result {
                Ok(verified) => *version_mismatch |= !verified,
                Err(e @ OrchestratorError::Build { .. }) => {
                    products.insert(*product, product_status);
                    errors.push(e);
                    break;
                }
                Err(e) => errors.push(e),
            }
            products.insert(*product, product_status);
        }

        // Products not reached after a construction failure keep their recorded state
        for (product, placeholder) in &stage.products {
            if !products.contains_key(product) {
                let kept = status
                    .stages
                    .get(&stage.name)
                    .and_then(|s| s.products.get(product))
                    .cloned()
                    .unwrap_or_else(|| placeholder.clone());
                products.insert(*product, kept);
            }
        }

        let phase = aggregate(&products);
        status.stages.insert(
            stage.name,
            StageStatus {
                name: stage.name,
                phase,
                products,
            },
        );
        (phase, OrchestratorError::combine(errors))
    }

    /// Build and run one product reconciler
    ///
    /// Returns whether the product's recorded versions match what it installs.
    /// Transient errors keep the product's phase; anything else marks it `Failed`.
    async fn reconcile_product(
        &self,
        installation: &Rhmi,
        stage: StageName,
        product_status: &mut ProductStatus,
        context: &ProductContext,
    ) -> Result<bool, OrchestratorError> {
        let product = product_status.name;
        let reconciler = match self.registry.build(product, installation, context).await {
            Ok(reconciler) => reconciler,
            Err(source) => {
                product_status.phase = StatusPhase::Failed;
                product_status.last_error = Some(source.to_string());
                return Err(OrchestratorError::Build { product, source });
            }
        };

        let before = product_status.phase;
        match reconciler
            .reconcile(installation, product_status, &*self.client)
            .await
        {
            Ok(phase) => {
                if !before.can_transition_to(phase) {
                    debug!(from = %before, to = %phase, "Product phase moved backwards");
                }
                product_status.phase = phase;
                product_status.last_error = None;
                let mut verified = installation.clone();
                verified
                    .status
                    .get_or_insert_with(RhmiStatus::default)
                    .stages
                    .entry(stage)
                    .or_insert_with(|| StageStatus {
                        name: stage,
                        phase: StatusPhase::InProgress,
                        products: BTreeMap::new(),
                    })
                    .products
                    .insert(product, product_status.clone());
                Ok(reconciler.verify_version(&verified))
            }
            Err(source) => {
                if source.is_transient() {
                    debug!(error = %source, "Transient product error");
                } else {
                    warn!(error = %source, "Product failed");
                    product_status.phase = StatusPhase::Failed;
                }
                product_status.last_error = Some(source.to_string());
                Err(OrchestratorError::Install { product, source })
            }
        }
    }

    async fn run_uninstall(
        &self,
        installation: &Rhmi,
        status: &mut RhmiStatus,
        installation_type: &InstallationType,
        context: &ProductContext,
    ) -> ReconcileOutcome {
        info!(installation = %installation.name_any(), "Uninstalling");
        let result = reconcile_finalizer(
            &*self.client,
            installation,
            INSTALLATION_FINALIZER,
            self.config.status_write_retries,
            || self.uninstall_stages(installation, status, installation_type, context),
        )
        .await;
        match result {
            Ok(phase) if phase.is_completed() => {
                info!(installation = %installation.name_any(), "Uninstall completed");
                ReconcileOutcome {
                    phase,
                    requeue_after: None,
                    error: None,
                }
            }
            Ok(phase) => self.in_progress(phase, None),
            Err(e) => {
                status.last_error = Some(e.to_string());
                self.in_progress(StatusPhase::InProgress, Some(e))
            }
        }
    }

    /// Walk the uninstall stages, stopping at the first that is still pending
    async fn uninstall_stages(
        &self,
        installation: &Rhmi,
        status: &mut RhmiStatus,
        installation_type: &InstallationType,
        context: &ProductContext,
    ) -> Result<StatusPhase, OrchestratorError> {
        status.stage = Some(StageName::Deletion);
        status.last_error = None;

        for stage in &installation_type.uninstall_stages {
            let (phase, errors) = if stage.name == StageName::UninstallBootstrap {
                context.config_manager.delete().await?;
                (StatusPhase::Completed, Vec::new())
            } else {
                self.uninstall_stage(installation, stage, status, context)
                    .instrument(info_span!("stage", stage = %stage.name))
                    .await
            };
            metrics::set_stage_phase(stage.name, phase);
            if stage.name == StageName::UninstallBootstrap {
                status.stages.insert(
                    stage.name,
                    StageStatus {
                        name: stage.name,
                        phase,
                        products: BTreeMap::new(),
                    },
                );
            }

            if let Some(error) = OrchestratorError::combine(errors) {
                return Err(error);
            }
            if !phase.is_completed() {
                debug!(stage = %stage.name, "Uninstall stage pending");
                return Ok(StatusPhase::InProgress);
            }
        }
        Ok(StatusPhase::Completed)
    }

    async fn uninstall_stage(
        &self,
        installation: &Rhmi,
        stage: &Stage,
        status: &mut RhmiStatus,
        context: &ProductContext,
    ) -> (StatusPhase, Vec<OrchestratorError>) {
        let mut products = BTreeMap::new();
        let mut errors = Vec::new();
        let mut pending = false;

        for (product, placeholder) in &stage.products {
            let mut product_status = status
                .stages
                .get(&stage.name)
                .and_then(|s| s.products.get(product))
                .cloned()
                .unwrap_or_else(|| placeholder.clone());

            if !installation.has_finalizer(&product.finalizer()) {
                product_status.phase = StatusPhase::Completed;
                products.insert(*product, product_status);
                continue;
            }

            let result: Result<StatusPhase, ReconcileError> = async {
                let reconciler = self.registry.build(*product, installation, context).await?;
                reconciler
                    .reconcile(installation, &mut product_status, &*self.client)
                    .await
            }
            .instrument(info_span!("product", product = %product))
            .await;
            match result {
                Ok(phase) => {
                    product_status.phase = phase;
                    product_status.last_error = None;
                    pending |= !phase.is_completed();
                }
                Err(source) => {
                    product_status.last_error = Some(source.to_string());
                    pending = true;
                    errors.push(OrchestratorError::Uninstall {
                        product: *product,
                        source,
                    });
                }
            }
            metrics::set_product_phase(*product, product_status.phase);
            products.insert(*product, product_status);
        }

        let phase = if pending {
            StatusPhase::InProgress
        } else {
            StatusPhase::Completed
        };
        status.stages.insert(
            stage.name,
            StageStatus {
                name: stage.name,
                phase,
                products,
            },
        );
        (phase, errors)
    }
}
