//! Orchestration layer for extension publishing
//!
//! This module provides package resolution and the pipeline that drives a
//! store through token exchange, upload and publish.

pub mod package_locator;
pub mod pipeline;

// Re-export main types for convenience
pub use package_locator::resolve_package;
pub use pipeline::{Pipeline, PublishRequest, RunReport};
