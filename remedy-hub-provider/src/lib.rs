//! Provider layer for Remedy Hub
//!
//! Defines the traits through which the engine consumes its external
//! collaborators: resource listing, sub-resource lookup, templated
//! deployments, and audit reporting. Ships an in-memory provider for
//! development and testing.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::ProviderError;
pub use memory::InMemoryProvider;
pub use traits::{AuditSink, DeploymentBackend, DeploymentMode, ResourceSource, SubresourceLookup};

/// Unified provider trait
pub trait Provider:
    ResourceSource + SubresourceLookup + DeploymentBackend + AuditSink + Send + Sync
{
}

impl<T> Provider for T where
    T: ResourceSource + SubresourceLookup + DeploymentBackend + AuditSink + Send + Sync
{
}
