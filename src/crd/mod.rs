//! # Custom Resource Definitions
//!
//! The operator's own resources:
//!
//! - [`Rhmi`] (`RHMI`): one product suite installation and its staged status
//! - [`RhmiConfig`] (`RHMIConfig`): the user-editable upgrade schedule

mod installation;
mod names;
mod phase;
mod rhmi_config;

pub use installation::*;
pub use names::*;
pub use phase::*;
pub use rhmi_config::*;
