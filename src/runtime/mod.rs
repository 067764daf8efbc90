//! # Runtime Module
//!
//! Process startup, the error policy of both controllers, the watch loop and the HTTP
//! server for metrics and probes.

pub mod error_policy;
pub mod initialization;
pub mod server;
pub mod watch_loop;

pub use error_policy::*;
pub use initialization::*;
pub use server::{start_server, ServerState};
pub use watch_loop::*;
