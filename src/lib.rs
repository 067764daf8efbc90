//! RHMI Operator Library
//!
//! Staged installation, upgrade approval and removal of a managed product suite.
//! Tests are included in the module files and under `tests/`.

pub mod cluster;
pub mod config;
pub mod config_store;
pub mod constants;
pub mod crd;
pub mod installation;
pub mod marketplace;
pub mod observability;
pub mod olm;
pub mod products;
pub mod resources;
pub mod runtime;
pub mod upgrade;

// Re-export CRD types for convenience
pub use crd::*;
