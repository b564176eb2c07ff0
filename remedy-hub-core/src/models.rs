//! Core domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Scope predicate determining which resources a policy applies to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopePredicate {
    /// Resource type the policy targets (exact match)
    pub resource_type: String,
    /// Locations the policy applies in
    pub allowed_locations: Vec<String>,
}

impl ScopePredicate {
    /// Whether a location falls inside the allowed set.
    ///
    /// Comparison is case-insensitive; provider region identifiers
    /// are case-insensitive in practice. An empty location never
    /// matches.
    pub fn allows_location(&self, location: &str) -> bool {
        !location.is_empty()
            && self
                .allowed_locations
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(location))
    }
}

/// One field-equality check against a sub-resource's properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceCondition {
    /// Dot-separated path into the sub-resource properties
    pub field: String,
    /// Expected value, compared as an exact string
    pub equals: String,
}

/// Enablement flag threaded through deployments as the literal
/// strings "True"/"False".
///
/// Condition matching depends on exact string equality, so this is
/// an enumerated two-valued string type, never a native bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnablementFlag {
    True,
    False,
}

impl EnablementFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnablementFlag::True => "True",
            EnablementFlag::False => "False",
        }
    }
}

/// Parameterized deployment template applied when a resource is
/// found non-compliant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationTemplate {
    /// Name of the diagnostic profile the deployment creates
    pub profile_name: String,
    /// Workspace the diagnostic data is routed to
    pub workspace_id: String,
    pub logs_enabled: EnablementFlag,
    pub metrics_enabled: EnablementFlag,
}

/// A compliance policy: scope predicate, existence conditions, and
/// the remediation applied when the conditions do not hold.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    pub scope: ScopePredicate,
    /// Field checks the sub-resource must satisfy to be compliant
    pub existence: Vec<ExistenceCondition>,
    pub remediation: RemediationTemplate,
    /// Role identifiers the deploying identity must hold
    pub required_roles: Vec<String>,
    /// Message reported for every non-compliant resource
    pub non_compliance_message: String,
    /// When this policy was registered
    pub created_at: DateTime<Utc>,
}

impl PolicyDefinition {
    pub fn new(req: CreatePolicyRequest) -> Result<Self, CoreError> {
        if req.scope.resource_type.trim().is_empty() {
            return Err(CoreError::InvalidPolicy(
                "scope resource_type must not be empty".to_string(),
            ));
        }
        if req.scope.allowed_locations.is_empty() {
            return Err(CoreError::InvalidPolicy(
                "scope allowed_locations must not be empty".to_string(),
            ));
        }
        if req.remediation.profile_name.trim().is_empty() {
            return Err(CoreError::InvalidPolicy(
                "remediation profile_name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: req.name,
            scope: req.scope,
            existence: req.existence,
            remediation: req.remediation,
            required_roles: req.required_roles,
            non_compliance_message: req.non_compliance_message,
            created_at: Utc::now(),
        })
    }
}

/// One observed resource instance, produced per evaluation cycle by
/// the resource source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Full provider path uniquely identifying the resource
    pub id: String,
    /// Short resource name
    pub name: String,
    pub resource_type: String,
    pub location: String,
    /// Opaque provider properties
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Result of evaluating a policy's existence conditions against a
/// resource's sub-resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistenceCheckResult {
    /// Whether every condition held
    pub compliant: bool,
    /// The specific conditions that failed
    pub failed_conditions: Vec<ExistenceCondition>,
}

impl ExistenceCheckResult {
    pub fn compliant() -> Self {
        Self {
            compliant: true,
            failed_conditions: Vec::new(),
        }
    }

    pub fn non_compliant(failed_conditions: Vec<ExistenceCondition>) -> Self {
        Self {
            compliant: false,
            failed_conditions,
        }
    }
}

/// Resolved parameter values bound into a remediation deployment.
///
/// Resource-derived values (name, location) are copied from the
/// descriptor; policy-derived values come from the remediation
/// template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentParameters {
    pub profile_name: String,
    pub resource_name: String,
    pub location: String,
    pub workspace_id: String,
    pub logs_enabled: EnablementFlag,
    pub metrics_enabled: EnablementFlag,
}

/// Fully-bound remediation request, consumed exactly once by the
/// deployment executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationIntent {
    /// Identity of the deployment template, taken from the declaring
    /// policy
    pub template_id: Uuid,
    /// Full path of the resource being remediated
    pub resource_id: String,
    pub parameters: DeploymentParameters,
    /// Roles the executing identity must hold for this deployment
    pub required_roles: Vec<String>,
}

impl RemediationIntent {
    /// Name of the sub-resource this intent creates or updates
    pub fn subresource_name(&self) -> &str {
        &self.parameters.profile_name
    }

    /// Key under which concurrent attempts for the same sub-resource
    /// are serialized: the profile name under the resource namespace
    pub fn deployment_key(&self) -> String {
        format!("{}/{}", self.resource_id, self.parameters.profile_name)
    }
}

/// Status of one remediation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Succeeded,
    Failed,
    /// No remediation was needed; the resource was already compliant
    Skipped,
}

/// Classification of a deployment failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The executing identity lacks a required role; terminal until
    /// an operator grants the role
    PermissionDenied,
    /// Malformed template or parameter binding; terminal
    Validation,
    /// Provider-side timeout or throttling; retryable with backoff
    Transient,
}

impl FailureKind {
    pub fn retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Structured detail attached to a failed deployment outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one remediation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub status: DeploymentStatus,
    pub resource_id: String,
    pub subresource_name: String,
    pub error: Option<FailureDetail>,
    pub completed_at: DateTime<Utc>,
}

impl DeploymentOutcome {
    pub fn succeeded(intent: &RemediationIntent) -> Self {
        Self {
            status: DeploymentStatus::Succeeded,
            resource_id: intent.resource_id.clone(),
            subresource_name: intent.subresource_name().to_string(),
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(intent: &RemediationIntent, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: DeploymentStatus::Failed,
            resource_id: intent.resource_id.clone(),
            subresource_name: intent.subresource_name().to_string(),
            error: Some(FailureDetail {
                kind,
                message: message.into(),
            }),
            completed_at: Utc::now(),
        }
    }

    pub fn skipped(resource_id: impl Into<String>, subresource_name: impl Into<String>) -> Self {
        Self {
            status: DeploymentStatus::Skipped,
            resource_id: resource_id.into(),
            subresource_name: subresource_name.into(),
            error: None,
            completed_at: Utc::now(),
        }
    }

    /// Whether a later attempt for the same intent can succeed
    pub fn retryable(&self) -> bool {
        self.error
            .as_ref()
            .map(|detail| detail.kind.retryable())
            .unwrap_or(false)
    }
}

/// Record forwarded to the audit sink after a resource is evaluated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub resource_id: String,
    pub compliant: bool,
    pub failed_conditions: Vec<ExistenceCondition>,
    /// Configured non-compliance message, present when non-compliant
    pub message: Option<String>,
    pub outcome: Option<DeploymentOutcome>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn compliant(resource_id: impl Into<String>, outcome: DeploymentOutcome) -> Self {
        Self {
            resource_id: resource_id.into(),
            compliant: true,
            failed_conditions: Vec::new(),
            message: None,
            outcome: Some(outcome),
            recorded_at: Utc::now(),
        }
    }

    pub fn non_compliant(
        resource_id: impl Into<String>,
        failed_conditions: Vec<ExistenceCondition>,
        message: impl Into<String>,
        outcome: Option<DeploymentOutcome>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            compliant: false,
            failed_conditions,
            message: Some(message.into()),
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

/// Request to register a new policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub scope: ScopePredicate,
    pub existence: Vec<ExistenceCondition>,
    pub remediation: RemediationTemplate,
    #[serde(default)]
    pub required_roles: Vec<String>,
    pub non_compliance_message: String,
}

/// Summary of one full compliance cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Resources listed across all policies
    pub evaluated: usize,
    /// Resources inside some policy's scope
    pub matched: usize,
    /// Matched resources already satisfying their conditions
    pub compliant: usize,
    /// Non-compliant resources successfully remediated
    pub remediated: usize,
    /// Non-compliant resources whose remediation failed
    pub failed: usize,
    /// Listing or lookup errors; affected resources are retried on
    /// the next cycle
    pub errors: usize,
    pub records: Vec<AuditRecord>,
}
