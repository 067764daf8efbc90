//! # RHMI Operator
//!
//! Installs a managed product suite on an OpenShift cluster as one staged, resumable
//! operation, approves upgrades of the operator inside the windows its users allow, and
//! removes the suite again when the installation is deleted.
//!
//! ## Overview
//!
//! 1. **Installation** - an `RHMI` object selects an installation flavor; its products
//!    are installed stage by stage, never starting a stage before the previous one has
//!    completed
//! 2. **Upgrades** - install plans of the operator's own subscription are approved
//!    manually, according to the `RHMIConfig` upgrade schedule
//! 3. **Uninstall** - deleting the `RHMI` object walks the uninstall stages before the
//!    object is allowed to disappear
//!
//! Metrics and health probes are served over HTTP (`/metrics`, `/healthz`, `/readyz`).

use anyhow::Result;
use rhmi_operator::runtime::initialization::initialize;
use rhmi_operator::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.client,
        &init_result.config.watch_namespace,
        init_result.orchestrator,
        init_result.upgrades,
        init_result.server_state,
    )
    .await
}
