//! # Resource Primitives
//!
//! Idempotent building blocks every product reconciler is made of. Each call does one
//! step towards the desired state and returns the resulting [`crate::StatusPhase`]; none
//! of them waits for the cluster to converge.
//!
//! "Already exists" on create and "not found" on lookups are steady state, not errors.
//! Any other cluster error is handed back to the caller unchanged.

mod finalizer;
mod labels;
mod namespace;
mod pull_secret;
mod subscription;

pub use finalizer::reconcile_finalizer;
pub use labels::{is_owned_by, prepare_object_labels};
pub use namespace::{delete_namespace, reconcile_namespace};
pub use pull_secret::reconcile_pull_secret;
pub use subscription::reconcile_subscription;
