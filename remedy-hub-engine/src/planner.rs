//! Remediation planning for non-compliant resources

use remedy_hub_core::{
    DeploymentParameters, ExistenceCheckResult, PolicyDefinition, RemediationIntent,
    ResourceDescriptor,
};

/// Build the remediation intent for a non-compliant resource.
///
/// Returns `None` when the check reported compliant: an explicit
/// skip, not an error. The binding is deterministic; the same
/// (resource, policy) pair always yields the same intent, so
/// re-evaluation is safe with no side effects beyond the deployment
/// itself. Resource-derived values are taken from the descriptor as
/// observed, never recomputed.
pub fn plan(
    resource: &ResourceDescriptor,
    policy: &PolicyDefinition,
    check: &ExistenceCheckResult,
) -> Option<RemediationIntent> {
    if check.compliant {
        return None;
    }

    Some(RemediationIntent {
        template_id: policy.id,
        resource_id: resource.id.clone(),
        parameters: DeploymentParameters {
            profile_name: policy.remediation.profile_name.clone(),
            resource_name: resource.name.clone(),
            location: resource.location.clone(),
            workspace_id: policy.remediation.workspace_id.clone(),
            logs_enabled: policy.remediation.logs_enabled,
            metrics_enabled: policy.remediation.metrics_enabled,
        },
        required_roles: policy.required_roles.clone(),
    })
}
