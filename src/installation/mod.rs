//! # Installation
//!
//! Staged install and uninstall of a product suite.
//!
//! - [`types`] - stage tables per installation flavor
//! - [`bootstrap`] - discovery run before any product stage
//! - [`preflight`] - checks for conflicting deployments before the first install pass
//! - [`orchestrator`] - one pass over the stages of an installation
//! - [`controller`] - kube-runtime glue that persists the status

pub mod bootstrap;
pub mod controller;
mod error;
pub mod orchestrator;
pub mod platform;
pub mod preflight;
pub mod types;

pub use controller::reconcile_installation;
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, ReconcileOutcome};
pub use platform::detect_platform;
pub use types::{type_for_flavor, Flavor, InstallationType, Stage, StageError};
