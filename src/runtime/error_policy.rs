//! # Error Policy
//!
//! What the controller runtime does when a reconciliation returns an error. Errors are
//! retried after a fixed delay; there is no backoff because every pass is expected to
//! converge monotonically.

use crate::crd::Rhmi;
use crate::installation::{Orchestrator, OrchestratorError};
use crate::observability::metrics;
use crate::olm::Subscription;
use crate::upgrade::{UpgradeContext, UpgradeError};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, warn};

/// Requeue a failed installation pass after the in-progress delay
pub fn installation_error_policy(
    installation: Arc<Rhmi>,
    error: &OrchestratorError,
    orchestrator: Arc<Orchestrator>,
) -> Action {
    let name = installation.name_any();
    if error.is_transient() {
        warn!(installation = %name, error = %error, "Reconciliation failed, retrying");
    } else {
        error!(installation = %name, error = %error, "Reconciliation failed");
    }
    metrics::increment_reconciliation_errors(error.as_str());
    metrics::increment_requeues_total("error");
    Action::requeue(orchestrator.config().requeue_in_progress())
}

/// Requeue a failed upgrade evaluation after the upgrade wait delay
pub fn subscription_error_policy(
    subscription: Arc<Subscription>,
    error: &UpgradeError,
    ctx: Arc<UpgradeContext>,
) -> Action {
    error!(
        subscription = %subscription.name_any(),
        reason = error.as_str(),
        error = %error,
        "Upgrade evaluation failed"
    );
    metrics::increment_reconciliation_errors(error.as_str());
    metrics::increment_requeues_total("error");
    Action::requeue(ctx.config().upgrade_wait_requeue())
}
