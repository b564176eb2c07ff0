//! Provider traits defining the interface to the cloud edge

use async_trait::async_trait;
use remedy_hub_core::{AuditRecord, DeploymentParameters, ResourceDescriptor};
use serde::{Deserialize, Serialize};

use crate::ProviderError;

/// Deployment mode requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    /// Create or update only the declared sub-resource, leaving
    /// sibling configuration on the parent untouched
    Incremental,
    /// Full replace of the target's sub-resources
    Complete,
}

/// Trait for listing the resources a policy evaluates
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// List resources of the given type
    async fn list_resources(
        &self,
        type_filter: &str,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError>;
}

/// Trait for fetching a named sub-resource of a parent resource
#[async_trait]
pub trait SubresourceLookup: Send + Sync {
    /// Fetch the sub-resource's properties.
    ///
    /// `Ok(None)` means the sub-resource does not exist, which is a
    /// distinct outcome from an error.
    async fn fetch_subresource(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, ProviderError>;
}

/// Trait for executing templated deployments
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    async fn deploy(
        &self,
        template_id: &str,
        parameters: &DeploymentParameters,
        target: &str,
        mode: DeploymentMode,
    ) -> Result<(), ProviderError>;
}

/// Trait for receiving compliance and deployment records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), ProviderError>;
}
