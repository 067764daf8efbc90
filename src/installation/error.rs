//! # Orchestrator Errors

use super::types::StageError;
use crate::cluster::ClusterError;
use crate::config_store::ConfigError;
use crate::crd::ProductName;
use crate::products::ReconcileError;
use thiserror::Error;

/// Error surfaced by one orchestration pass
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build a reconciler for {product}: {source}")]
    Build {
        product: ProductName,
        #[source]
        source: ReconcileError,
    },
    #[error("failed installation of {product}: {source}")]
    Install {
        product: ProductName,
        #[source]
        source: ReconcileError,
    },
    #[error("failed uninstallation of {product}: {source}")]
    Uninstall {
        product: ProductName,
        #[source]
        source: ReconcileError,
    },
    #[error("Bootstrap stage reconcile failed: {0}")]
    Bootstrap(#[source] ReconcileError),
    #[error("{}", join(.0))]
    Multiple(Vec<OrchestratorError>),
}

fn join(errors: &[OrchestratorError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OrchestratorError {
    /// Collapse `errors` into one error, `None` when empty
    pub fn combine(mut errors: Vec<OrchestratorError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(OrchestratorError::Multiple(errors)),
        }
    }

    /// Whether a later pass can succeed without a configuration change
    pub fn is_transient(&self) -> bool {
        match self {
            OrchestratorError::Stage(_) => false,
            OrchestratorError::Cluster(e) => e.is_transient(),
            OrchestratorError::Config(e) => e.is_transient(),
            OrchestratorError::Build { source, .. }
            | OrchestratorError::Install { source, .. }
            | OrchestratorError::Uninstall { source, .. }
            | OrchestratorError::Bootstrap(source) => source.is_transient(),
            OrchestratorError::Multiple(errors) => errors.iter().all(Self::is_transient),
        }
    }

    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorError::Stage(e) => e.as_str(),
            OrchestratorError::Cluster(e) => e.as_str(),
            OrchestratorError::Config(e) => e.as_str(),
            OrchestratorError::Build { .. } => "build",
            OrchestratorError::Install { .. } => "install",
            OrchestratorError::Uninstall { .. } => "uninstall",
            OrchestratorError::Bootstrap(_) => "bootstrap",
            OrchestratorError::Multiple(_) => "multiple",
        }
    }
}
