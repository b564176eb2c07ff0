//! Scope matching

use remedy_hub_core::{PolicyDefinition, ResourceDescriptor};

/// Whether a resource falls inside a policy's scope predicate.
///
/// True iff the resource type equals the policy's target type and
/// the location is a member of the allowed set. Total over any
/// well-formed descriptor: a non-match is `false`, never an error.
pub fn matches(resource: &ResourceDescriptor, policy: &PolicyDefinition) -> bool {
    resource.resource_type == policy.scope.resource_type
        && policy.scope.allows_location(&resource.location)
}
