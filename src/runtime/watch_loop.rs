//! # Watch Loop
//!
//! Runs the installation and subscription controllers side by side until the process
//! receives a shutdown signal.

use super::error_policy::{installation_error_policy, subscription_error_policy};
use super::server::ServerState;
use crate::crd::Rhmi;
use crate::installation::{reconcile_installation, Orchestrator};
use crate::olm::Subscription;
use crate::upgrade::{reconcile_subscription, UpgradeContext};
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::Client;
use kube_runtime::Controller;
use std::sync::Arc;
use tracing::info;

/// Server-side watch timeout, kept below the API server's own limit
const WATCH_TIMEOUT_SECS: u32 = 25;

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

/// Watch RHMI and Subscription objects in `namespace`
pub async fn run_watch_loop(
    client: Client,
    namespace: &str,
    orchestrator: Arc<Orchestrator>,
    upgrades: Arc<UpgradeContext>,
    server_state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let installations: Api<Rhmi> = Api::namespaced(client.clone(), namespace);
    let subscriptions: Api<Subscription> = Api::namespaced(client, namespace);
    info!(namespace, "Starting installation and subscription controllers");

    let installation_controller = Controller::new(
        installations,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile_installation, installation_error_policy, orchestrator)
    .for_each(log_reconcile_result("Installation"));

    let subscription_controller = Controller::new(
        subscriptions,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile_subscription, subscription_error_policy, upgrades)
    .for_each(log_reconcile_result("Subscription"));

    futures::join!(installation_controller, subscription_controller);

    server_state.set_ready(false);
    info!("Controllers stopped");
    Ok(())
}
