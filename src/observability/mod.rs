//! # Observability
//!
//! Prometheus metrics for the installation and upgrade controllers.

pub mod metrics;
