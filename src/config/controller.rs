//! # Controller Configuration
//!
//! Reconciliation timings, names and platform selection.

use super::env_var_or_default;
use crate::constants::*;
use std::str::FromStr;
use std::time::Duration;

/// Cloud platform the cluster runs on
///
/// Some products are only installed on particular platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Aws,
    Gcp,
    Other,
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "aws" => Platform::Aws,
            "gcp" => Platform::Gcp,
            _ => Platform::Other,
        })
    }
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace holding the RHMI, RHMIConfig and the installation config record
    pub watch_namespace: String,
    /// Explicit installation config record name, overrides `<prefix>installation-config`
    pub installation_config_map: Option<String>,
    /// Requeue delay while any stage is incomplete (seconds)
    pub requeue_in_progress_secs: u64,
    /// Requeue delay once the installation is complete (seconds)
    pub requeue_complete_secs: u64,
    /// Requeue delay after approving an install plan (seconds)
    pub upgrade_approved_requeue_secs: u64,
    /// Requeue delay while an upgrade waits for its window (seconds)
    pub upgrade_wait_requeue_secs: u64,
    /// Timeout for ad-hoc cluster lookups during bootstrap (seconds)
    pub cluster_api_timeout_secs: u64,
    /// Attempts for read-modify-write updates on conflict
    pub status_write_retries: u32,
    /// Forced platform; detected from the cluster when unset
    pub platform: Option<Platform>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: DEFAULT_WATCH_NAMESPACE.to_string(),
            installation_config_map: None,
            requeue_in_progress_secs: DEFAULT_REQUEUE_IN_PROGRESS_SECS,
            requeue_complete_secs: DEFAULT_REQUEUE_COMPLETE_SECS,
            upgrade_approved_requeue_secs: DEFAULT_UPGRADE_APPROVED_REQUEUE_SECS,
            upgrade_wait_requeue_secs: DEFAULT_UPGRADE_WAIT_REQUEUE_SECS,
            cluster_api_timeout_secs: DEFAULT_CLUSTER_API_TIMEOUT_SECS,
            status_write_retries: DEFAULT_STATUS_WRITE_RETRIES,
            platform: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            watch_namespace: env_var_or_default(
                "WATCH_NAMESPACE",
                DEFAULT_WATCH_NAMESPACE.to_string(),
            ),
            installation_config_map: std::env::var("INSTALLATION_CONFIG_MAP")
                .ok()
                .filter(|v| !v.is_empty()),
            requeue_in_progress_secs: env_var_or_default(
                "REQUEUE_IN_PROGRESS_SECS",
                DEFAULT_REQUEUE_IN_PROGRESS_SECS,
            ),
            requeue_complete_secs: env_var_or_default(
                "REQUEUE_COMPLETE_SECS",
                DEFAULT_REQUEUE_COMPLETE_SECS,
            ),
            upgrade_approved_requeue_secs: env_var_or_default(
                "UPGRADE_APPROVED_REQUEUE_SECS",
                DEFAULT_UPGRADE_APPROVED_REQUEUE_SECS,
            ),
            upgrade_wait_requeue_secs: env_var_or_default(
                "UPGRADE_WAIT_REQUEUE_SECS",
                DEFAULT_UPGRADE_WAIT_REQUEUE_SECS,
            ),
            cluster_api_timeout_secs: env_var_or_default(
                "CLUSTER_API_TIMEOUT_SECS",
                DEFAULT_CLUSTER_API_TIMEOUT_SECS,
            ),
            status_write_retries: env_var_or_default(
                "STATUS_WRITE_RETRIES",
                DEFAULT_STATUS_WRITE_RETRIES,
            ),
            platform: std::env::var("INSTALLATION_PLATFORM")
                .ok()
                .filter(|v| !v.is_empty())
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Name of the installation config record for a namespace prefix
    pub fn config_map_name(&self, namespace_prefix: &str) -> String {
        self.installation_config_map
            .clone()
            .unwrap_or_else(|| format!("{namespace_prefix}{INSTALLATION_CONFIG_SUFFIX}"))
    }

    pub fn requeue_in_progress(&self) -> Duration {
        Duration::from_secs(self.requeue_in_progress_secs)
    }

    pub fn requeue_complete(&self) -> Duration {
        Duration::from_secs(self.requeue_complete_secs)
    }

    pub fn upgrade_approved_requeue(&self) -> Duration {
        Duration::from_secs(self.upgrade_approved_requeue_secs)
    }

    pub fn upgrade_wait_requeue(&self) -> Duration {
        Duration::from_secs(self.upgrade_wait_requeue_secs)
    }

    pub fn cluster_api_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_api_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_map_name_uses_prefix_by_default() {
        let config = ControllerConfig::default();
        assert_eq!(
            config.config_map_name("redhat-rhmi-"),
            "redhat-rhmi-installation-config"
        );
    }

    #[test]
    fn test_config_map_name_override() {
        let config = ControllerConfig {
            installation_config_map: Some("custom".to_string()),
            ..ControllerConfig::default()
        };
        assert_eq!(config.config_map_name("redhat-rhmi-"), "custom");
    }

    #[test]
    fn test_platform_parsing_is_case_insensitive() {
        assert_eq!("GCP".parse::<Platform>(), Ok(Platform::Gcp));
        assert_eq!("aws".parse::<Platform>(), Ok(Platform::Aws));
        assert_eq!("None".parse::<Platform>(), Ok(Platform::Other));
    }
}
