//! # Metrics Module
//!
//! Prometheus metrics for monitoring the operator, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text encoding
//! - `controller_metrics` - Installation reconciliation metrics (passes, errors, phases)
//! - `upgrade_metrics` - Upgrade approval metrics

pub mod controller_metrics;
pub mod registry;
pub mod upgrade_metrics;

pub use controller_metrics::*;
pub use registry::*;
pub use upgrade_metrics::*;
