//! Upgrade Integration Tests
//!
//! - Decisions on pending install plans
//! - The subscription controller entry point

pub mod decisions;
pub mod fixtures;
pub mod subscription;
