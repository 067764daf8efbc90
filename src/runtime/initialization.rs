//! # Initialization
//!
//! Process startup: rustls, tracing, metrics, the HTTP server, the Kubernetes client and
//! the shared state of both controllers.

use super::server::{start_server, ServerState};
use crate::cluster::{ClusterClient, EventRecorder, KubeCluster, KubeEventRecorder};
use crate::config::{load_config, ControllerConfig, ServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::installation::{detect_platform, Orchestrator};
use crate::marketplace::{MarketplaceManager, PackageInstaller};
use crate::observability;
use crate::products::ReconcilerRegistry;
use crate::upgrade::UpgradeContext;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub config: Arc<ControllerConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub upgrades: Arc<UpgradeContext>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rhmi_operator=info".into()),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting {}", CONTROLLER_NAME
    );

    let (controller_config, server_config) = load_config();
    let config = Arc::new(controller_config);

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = server_config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!(error = %e, "HTTP server error");
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let cluster: Arc<dyn ClusterClient> = Arc::new(KubeCluster::new(client.clone()));
    let recorder: Arc<dyn EventRecorder> =
        Arc::new(KubeEventRecorder::new(client.clone(), CONTROLLER_NAME));
    let installer: Arc<dyn PackageInstaller> = Arc::new(MarketplaceManager::new());

    let platform = detect_platform(&*cluster, config.platform).await;
    info!(?platform, namespace = %config.watch_namespace, "Cluster platform resolved");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&cluster),
        installer,
        Arc::clone(&recorder),
        Arc::new(ReconcilerRegistry::with_defaults()),
        Arc::clone(&config),
        platform,
    ));
    let upgrades = Arc::new(UpgradeContext::new(cluster, recorder, Arc::clone(&config)));

    info!("Operator initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        config,
        orchestrator,
        upgrades,
        server_state,
    })
}

/// Wait for the HTTP server to bind before the controllers start
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
