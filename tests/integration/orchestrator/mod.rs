//! Orchestrator Integration Tests
//!
//! - Install passes: preflight, stage gating, retries, completion
//! - Uninstall passes: stage order and release of the installation

pub mod fixtures;
pub mod install;
pub mod uninstall;
