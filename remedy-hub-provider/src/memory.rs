//! In-memory provider implementation for development and testing

use async_trait::async_trait;
use remedy_hub_core::{AuditRecord, DeploymentParameters, ResourceDescriptor};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::{AuditSink, DeploymentBackend, DeploymentMode, ProviderError, ResourceSource, SubresourceLookup};

/// In-memory provider for development and testing.
///
/// Resources and sub-resources live in guarded maps; `deploy` writes
/// the sub-resource a real backend would create, so evaluation after
/// remediation sees the deployed state.
pub struct InMemoryProvider {
    resources: RwLock<Vec<ResourceDescriptor>>,
    /// (parent resource id, sub-resource name) -> properties
    subresources: RwLock<HashMap<(String, String), serde_json::Value>>,
    audit_log: RwLock<Vec<AuditRecord>>,
    deploy_calls: AtomicU64,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(Vec::new()),
            subresources: RwLock::new(HashMap::new()),
            audit_log: RwLock::new(Vec::new()),
            deploy_calls: AtomicU64::new(0),
        }
    }

    /// Seed a resource into the provider
    pub fn add_resource(&self, resource: ResourceDescriptor) {
        self.resources.write().unwrap().push(resource);
    }

    /// Seed a sub-resource under a parent resource
    pub fn put_subresource(&self, parent_id: &str, name: &str, properties: serde_json::Value) {
        self.subresources
            .write()
            .unwrap()
            .insert((parent_id.to_string(), name.to_string()), properties);
    }

    /// Current state of a sub-resource, if present
    pub fn subresource(&self, parent_id: &str, name: &str) -> Option<serde_json::Value> {
        self.subresources
            .read()
            .unwrap()
            .get(&(parent_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Records the sink has received
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit_log.read().unwrap().clone()
    }

    /// Number of deployments issued against this provider
    pub fn deploy_call_count(&self) -> u64 {
        self.deploy_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Sub-resource properties produced by a deployment, mirroring the
/// shape the existence conditions check against. The enablement
/// flags are threaded as strings end to end.
fn deployed_properties(parameters: &DeploymentParameters) -> serde_json::Value {
    json!({
        "workspaceId": parameters.workspace_id,
        "logs": { "enabled": parameters.logs_enabled.as_str() },
        "metrics": { "enabled": parameters.metrics_enabled.as_str() },
        "location": parameters.location,
        "resourceName": parameters.resource_name,
    })
}

#[async_trait]
impl ResourceSource for InMemoryProvider {
    async fn list_resources(
        &self,
        type_filter: &str,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let resources = self.resources.read().unwrap();
        Ok(resources
            .iter()
            .filter(|r| r.resource_type == type_filter)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SubresourceLookup for InMemoryProvider {
    async fn fetch_subresource(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, ProviderError> {
        let subresources = self.subresources.read().unwrap();
        Ok(subresources
            .get(&(parent_id.to_string(), name.to_string()))
            .cloned())
    }
}

#[async_trait]
impl DeploymentBackend for InMemoryProvider {
    async fn deploy(
        &self,
        _template_id: &str,
        parameters: &DeploymentParameters,
        target: &str,
        mode: DeploymentMode,
    ) -> Result<(), ProviderError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);

        let mut subresources = self.subresources.write().unwrap();
        if mode == DeploymentMode::Complete {
            // Full replace removes the target's other sub-resources
            subresources.retain(|(parent, _), _| parent != target);
        }
        subresources.insert(
            (target.to_string(), parameters.profile_name.clone()),
            deployed_properties(parameters),
        );
        Ok(())
    }
}

#[async_trait]
impl AuditSink for InMemoryProvider {
    async fn record(&self, record: AuditRecord) -> Result<(), ProviderError> {
        self.audit_log.write().unwrap().push(record);
        Ok(())
    }
}
