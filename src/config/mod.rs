//! # Configuration
//!
//! Everything tunable about the operator comes from the environment of its deployment.
//! Unset or unparsable variables fall back to the defaults in [`crate::constants`].

mod controller;
mod server;

pub use controller::{ControllerConfig, Platform};
pub use server::ServerConfig;

/// Controller and probe server settings from the process environment
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Parsed value of `key`, or `default` when it is unset or does not parse
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
