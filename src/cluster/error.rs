//! # Cluster Errors
//!
//! Classified errors returned by every [`super::ClusterClient`] implementation.

use thiserror::Error;

/// Error talking to the cluster API
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },
    /// The object changed since it was read (stale resource version)
    #[error("conflict updating {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },
    #[error("cluster API error ({code} {reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },
    #[error("failed to convert {kind}: {message}")]
    Serialization { kind: String, message: String },
    #[error("timed out after {0}s waiting for the cluster API")]
    Timeout(u64),
    #[error("cluster API request failed: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        ClusterError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn serialization(kind: &str, err: &serde_json::Error) -> Self {
        ClusterError::Serialization {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict { .. })
    }

    /// Whether retrying the same request later can succeed without a configuration change
    pub fn is_transient(&self) -> bool {
        match self {
            ClusterError::Conflict { .. }
            | ClusterError::Timeout(_)
            | ClusterError::Transport(_)
            | ClusterError::NotFound { .. } => true,
            ClusterError::Api { code, .. } => *code == 429 || *code >= 500,
            ClusterError::AlreadyExists { .. } | ClusterError::Serialization { .. } => false,
        }
    }

    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterError::NotFound { .. } => "not_found",
            ClusterError::AlreadyExists { .. } => "already_exists",
            ClusterError::Conflict { .. } => "conflict",
            ClusterError::Api { .. } => "api",
            ClusterError::Serialization { .. } => "serialization",
            ClusterError::Timeout(_) => "timeout",
            ClusterError::Transport(_) => "transport",
        }
    }

    /// Map a kube client error for an object of `kind` named `name`
    pub fn from_kube(err: kube::Error, kind: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => ClusterError::not_found(kind, name),
            kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
                ClusterError::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            kube::Error::Api(api_err) if api_err.code == 409 => ClusterError::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                message: api_err.message,
            },
            kube::Error::Api(api_err) => ClusterError::Api {
                code: api_err.code,
                reason: api_err.reason,
                message: api_err.message,
            },
            kube::Error::SerdeError(e) => ClusterError::serialization(kind, &e),
            other => ClusterError::Transport(other.to_string()),
        }
    }
}
