//! # Reconcile Errors

use crate::cluster::ClusterError;
use crate::config_store::ConfigError;
use crate::crd::ProductName;
use thiserror::Error;

/// Error returned by product reconcilers and their construction
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Product configuration that cannot work until someone changes it
    #[error("invalid configuration for {product}: {message}")]
    InvalidConfig {
        product: ProductName,
        message: String,
    },
    /// A downstream resource reported an unrecoverable failure
    #[error("{0}")]
    Failed(String),
    #[error("no reconciler registered for {0}")]
    NotRegistered(ProductName),
    #[error("{}", join(.0))]
    Multi(Vec<ReconcileError>),
}

fn join(errors: &[ReconcileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReconcileError {
    /// Whether a later pass can succeed without a configuration change
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Cluster(e) => e.is_transient(),
            ReconcileError::Config(e) => e.is_transient(),
            ReconcileError::Multi(errors) => errors.iter().all(ReconcileError::is_transient),
            ReconcileError::InvalidConfig { .. }
            | ReconcileError::Failed(_)
            | ReconcileError::NotRegistered(_) => false,
        }
    }

    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileError::Cluster(e) => e.as_str(),
            ReconcileError::Config(e) => e.as_str(),
            ReconcileError::InvalidConfig { .. } => "invalid_config",
            ReconcileError::Failed(_) => "failed",
            ReconcileError::NotRegistered(_) => "not_registered",
            ReconcileError::Multi(_) => "multiple",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_is_transient_only_when_all_are() {
        let transient = || ReconcileError::Cluster(ClusterError::Timeout(10));
        assert!(ReconcileError::Multi(vec![transient(), transient()]).is_transient());
        assert!(!ReconcileError::Multi(vec![
            transient(),
            ReconcileError::Failed("CSV failed".to_string())
        ])
        .is_transient());
    }

    #[test]
    fn test_multi_message_joins_errors() {
        let err = ReconcileError::Multi(vec![
            ReconcileError::Failed("a".to_string()),
            ReconcileError::Failed("b".to_string()),
        ]);
        assert_eq!(err.to_string(), "a; b");
    }
}
