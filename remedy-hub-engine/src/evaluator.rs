//! Existence evaluation against a policy's condition list

use remedy_hub_core::{ExistenceCheckResult, ExistenceCondition, PolicyDefinition, ResourceDescriptor};
use remedy_hub_provider::SubresourceLookup;
use std::sync::Arc;
use std::time::Duration;

use crate::EngineError;

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Decides whether a matched resource already satisfies a policy's
/// existence conditions.
///
/// The lookup is the only suspension point; it runs under a bounded
/// timeout so one unresponsive resource cannot stall a worker.
pub struct ExistenceEvaluator {
    lookup: Arc<dyn SubresourceLookup>,
    timeout: Duration,
}

impl ExistenceEvaluator {
    pub fn new(lookup: Arc<dyn SubresourceLookup>) -> Self {
        Self::with_timeout(lookup, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(lookup: Arc<dyn SubresourceLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Evaluate the policy's conditions against the resource's
    /// sub-resource.
    ///
    /// A missing sub-resource is non-compliant with every condition
    /// failed. A fetch failure is an error, never silent
    /// non-compliance: remediating on a transient fault would deploy
    /// spuriously.
    pub async fn evaluate(
        &self,
        resource: &ResourceDescriptor,
        policy: &PolicyDefinition,
    ) -> Result<ExistenceCheckResult, EngineError> {
        let fetch = self
            .lookup
            .fetch_subresource(&resource.id, &policy.remediation.profile_name);

        let properties = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| EngineError::LookupTimeout {
                resource_id: resource.id.clone(),
                after: self.timeout,
            })?
            .map_err(|source| EngineError::Lookup {
                resource_id: resource.id.clone(),
                source,
            })?;

        let Some(properties) = properties else {
            return Ok(ExistenceCheckResult::non_compliant(policy.existence.clone()));
        };

        let failed: Vec<ExistenceCondition> = policy
            .existence
            .iter()
            .filter(|condition| !condition_holds(&properties, condition))
            .cloned()
            .collect();

        if failed.is_empty() {
            Ok(ExistenceCheckResult::compliant())
        } else {
            Ok(ExistenceCheckResult::non_compliant(failed))
        }
    }
}

/// Resolve the condition's field path and compare the value as a
/// string. Values are policy-declared strings; boolean-like values
/// ("True"/"False") compare case-sensitively, so a native `true`
/// does not satisfy `equals: "True"`.
fn condition_holds(properties: &serde_json::Value, condition: &ExistenceCondition) -> bool {
    match resolve_path(properties, &condition.field).and_then(value_as_string) {
        Some(actual) => actual == condition.equals,
        None => false,
    }
}

fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
