//! The compliance cycle: one full evaluation pass

use chrono::Utc;
use remedy_hub_core::{
    AuditRecord, CycleReport, DeploymentOutcome, DeploymentStatus, FailureKind, PolicyDefinition,
    RemediationIntent, ResourceDescriptor,
};
use remedy_hub_deploy::DeploymentExecutor;
use remedy_hub_engine::{matches, plan, ExistenceEvaluator};
use remedy_hub_provider::ResourceSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::BufferedAuditSink;

const DEFAULT_CONCURRENCY: usize = 8;

/// Retry policy for retryable deployment failures. Terminal failures
/// (permission, validation) are never retried automatically.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay, doubled after each attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Runs one compliance cycle over the registered policies.
///
/// Resources are evaluated independently on a bounded worker pool;
/// the only shared state between workers is the read-only policy
/// data. Ordering holds only within a single resource's pipeline,
/// enforced by data dependency.
pub struct CycleRunner {
    source: Arc<dyn ResourceSource>,
    evaluator: Arc<ExistenceEvaluator>,
    executor: Arc<DeploymentExecutor>,
    audit: Arc<BufferedAuditSink>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl CycleRunner {
    pub fn new(
        source: Arc<dyn ResourceSource>,
        evaluator: Arc<ExistenceEvaluator>,
        executor: Arc<DeploymentExecutor>,
        audit: Arc<BufferedAuditSink>,
    ) -> Self {
        Self {
            source,
            evaluator,
            executor,
            audit,
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run one full pass: list resources per policy scope, evaluate
    /// each, remediate the non-compliant ones. Listing and lookup
    /// failures are counted and retried on the next cycle; they never
    /// abort the pass.
    pub async fn run_cycle(&self, policies: &[Arc<PolicyDefinition>]) -> CycleReport {
        let started_at = Utc::now();
        let mut tally = Tally::default();
        let mut workers = JoinSet::new();

        for policy in policies {
            let resources = match self.source.list_resources(&policy.scope.resource_type).await {
                Ok(resources) => resources,
                Err(err) => {
                    tracing::warn!(
                        "Listing {} failed, policy '{}' skipped this cycle: {}",
                        policy.scope.resource_type,
                        policy.name,
                        err
                    );
                    tally.errors += 1;
                    continue;
                }
            };

            for resource in resources {
                tally.evaluated += 1;
                while workers.len() >= self.concurrency {
                    if let Some(joined) = workers.join_next().await {
                        tally.absorb(joined);
                    }
                }
                workers.spawn(run_resource(
                    policy.clone(),
                    resource,
                    self.evaluator.clone(),
                    self.executor.clone(),
                    self.audit.clone(),
                    self.retry.clone(),
                ));
            }
        }

        while let Some(joined) = workers.join_next().await {
            tally.absorb(joined);
        }

        tracing::info!(
            "Cycle complete - evaluated: {}, matched: {}, compliant: {}, remediated: {}, failed: {}, errors: {}",
            tally.evaluated,
            tally.matched,
            tally.compliant,
            tally.remediated,
            tally.failed,
            tally.errors
        );

        CycleReport {
            started_at,
            finished_at: Utc::now(),
            evaluated: tally.evaluated,
            matched: tally.matched,
            compliant: tally.compliant,
            remediated: tally.remediated,
            failed: tally.failed,
            errors: tally.errors,
            records: tally.records,
        }
    }
}

#[derive(Default)]
struct Tally {
    evaluated: usize,
    matched: usize,
    compliant: usize,
    remediated: usize,
    failed: usize,
    errors: usize,
    records: Vec<AuditRecord>,
}

impl Tally {
    fn absorb(&mut self, joined: Result<ResourceResult, tokio::task::JoinError>) {
        match joined {
            Ok(ResourceResult::NotMatched) => {}
            Ok(ResourceResult::Compliant(record)) => {
                self.matched += 1;
                self.compliant += 1;
                self.records.push(record);
            }
            Ok(ResourceResult::Remediated(record)) => {
                self.matched += 1;
                self.remediated += 1;
                self.records.push(record);
            }
            Ok(ResourceResult::Failed(record)) => {
                self.matched += 1;
                self.failed += 1;
                self.records.push(record);
            }
            Ok(ResourceResult::Error) => {
                self.matched += 1;
                self.errors += 1;
            }
            Err(err) => {
                tracing::error!("Evaluation worker panicked: {}", err);
                self.errors += 1;
            }
        }
    }
}

enum ResourceResult {
    /// Outside the policy's scope; no further pipeline stage ran
    NotMatched,
    Compliant(AuditRecord),
    Remediated(AuditRecord),
    Failed(AuditRecord),
    /// Lookup failed; the resource is retried next cycle
    Error,
}

async fn run_resource(
    policy: Arc<PolicyDefinition>,
    resource: ResourceDescriptor,
    evaluator: Arc<ExistenceEvaluator>,
    executor: Arc<DeploymentExecutor>,
    audit: Arc<BufferedAuditSink>,
    retry: RetryPolicy,
) -> ResourceResult {
    if !matches(&resource, &policy) {
        return ResourceResult::NotMatched;
    }

    let check = match evaluator.evaluate(&resource, &policy).await {
        Ok(check) => check,
        Err(err) => {
            tracing::warn!("Evaluation of {} failed, retrying next cycle: {}", resource.id, err);
            return ResourceResult::Error;
        }
    };

    let Some(intent) = plan(&resource, &policy, &check) else {
        let record = AuditRecord::compliant(
            resource.id.clone(),
            DeploymentOutcome::skipped(resource.id.clone(), policy.remediation.profile_name.clone()),
        );
        audit.push(record.clone());
        return ResourceResult::Compliant(record);
    };

    // The configured message is reported whether or not the
    // remediation that follows succeeds
    tracing::warn!(resource = %resource.id, policy = %policy.name, "{}", policy.non_compliance_message);

    let outcome = apply_with_retry(&executor, &intent, &retry).await;
    let record = AuditRecord::non_compliant(
        resource.id.clone(),
        check.failed_conditions,
        policy.non_compliance_message.clone(),
        Some(outcome.clone()),
    );
    audit.push(record.clone());

    if outcome.status == DeploymentStatus::Succeeded {
        tracing::info!(
            "Remediated {} with sub-resource {}",
            resource.id,
            outcome.subresource_name
        );
        return ResourceResult::Remediated(record);
    }

    match outcome.error.as_ref() {
        Some(detail) if detail.kind == FailureKind::PermissionDenied => {
            tracing::error!(
                "Remediation of {} blocked: {}; a role grant is required before it can proceed",
                resource.id,
                detail.message
            );
        }
        Some(detail) => {
            tracing::warn!("Remediation of {} failed ({:?}): {}", resource.id, detail.kind, detail.message);
        }
        None => {
            tracing::warn!("Remediation of {} failed without detail", resource.id);
        }
    }
    ResourceResult::Failed(record)
}

async fn apply_with_retry(
    executor: &DeploymentExecutor,
    intent: &RemediationIntent,
    retry: &RetryPolicy,
) -> DeploymentOutcome {
    let mut attempt = 1u32;
    loop {
        let outcome = executor.apply(intent).await;
        if !outcome.retryable() || attempt >= retry.max_attempts {
            return outcome;
        }

        let delay = retry.backoff * 2u32.saturating_pow(attempt - 1);
        tracing::debug!(
            "Retrying deployment of {} in {:?} (attempt {}/{})",
            intent.resource_id,
            delay,
            attempt + 1,
            retry.max_attempts
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use remedy_hub_core::{
        CreatePolicyRequest, EnablementFlag, ExistenceCondition, RemediationTemplate,
        ScopePredicate,
    };
    use remedy_hub_provider::{
        DeploymentBackend, DeploymentMode, InMemoryProvider, ProviderError, SubresourceLookup,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    const PROFILE: &str = "setbypolicy_logAnalytics_audit";

    fn audit_policy(roles: &[&str]) -> Arc<PolicyDefinition> {
        Arc::new(
            PolicyDefinition::new(CreatePolicyRequest {
                name: "vault-diagnostics".to_string(),
                scope: ScopePredicate {
                    resource_type: "Vendor.KeyVault/vaults".to_string(),
                    allowed_locations: vec![
                        "australiaeast".to_string(),
                        "australiasoutheast".to_string(),
                    ],
                },
                existence: vec![
                    ExistenceCondition {
                        field: "logs.enabled".to_string(),
                        equals: "True".to_string(),
                    },
                    ExistenceCondition {
                        field: "metrics.enabled".to_string(),
                        equals: "False".to_string(),
                    },
                    ExistenceCondition {
                        field: "workspaceId".to_string(),
                        equals: "/sub/rg/ws/central".to_string(),
                    },
                ],
                remediation: RemediationTemplate {
                    profile_name: PROFILE.to_string(),
                    workspace_id: "/sub/rg/ws/central".to_string(),
                    logs_enabled: EnablementFlag::True,
                    metrics_enabled: EnablementFlag::False,
                },
                required_roles: roles.iter().map(|r| r.to_string()).collect(),
                non_compliance_message: "Diagnostic settings are missing".to_string(),
            })
            .unwrap(),
        )
    }

    fn vault(location: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            id: "/sub/rg/vaults/vault-1".to_string(),
            name: "vault-1".to_string(),
            resource_type: "Vendor.KeyVault/vaults".to_string(),
            location: location.to_string(),
            properties: serde_json::Value::Null,
        }
    }

    fn runner(provider: Arc<InMemoryProvider>, granted_roles: &[&str]) -> CycleRunner {
        let executor = DeploymentExecutor::new(
            provider.clone(),
            granted_roles.iter().map(|r| r.to_string()),
        );
        CycleRunner::new(
            provider.clone(),
            Arc::new(ExistenceEvaluator::new(provider.clone())),
            Arc::new(executor),
            Arc::new(BufferedAuditSink::new(provider)),
        )
    }

    #[tokio::test]
    async fn test_missing_subresource_is_remediated() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_resource(vault("australiaeast"));
        let policies = vec![audit_policy(&["monitoring"])];

        let report = runner(provider.clone(), &["monitoring"])
            .run_cycle(&policies)
            .await;

        assert_eq!(report.evaluated, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.remediated, 1);
        assert_eq!(report.failed, 0);

        let deployed = provider
            .subresource("/sub/rg/vaults/vault-1", PROFILE)
            .unwrap();
        assert_eq!(deployed["logs"]["enabled"], "True");
        assert_eq!(deployed["metrics"]["enabled"], "False");
        assert_eq!(deployed["workspaceId"], "/sub/rg/ws/central");

        let record = &report.records[0];
        assert!(!record.compliant);
        assert_eq!(record.message.as_deref(), Some("Diagnostic settings are missing"));
        assert_eq!(record.failed_conditions.len(), 3);
    }

    #[tokio::test]
    async fn test_out_of_scope_location_is_untouched() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_resource(vault("westus"));
        let policies = vec![audit_policy(&[])];

        let report = runner(provider.clone(), &[]).run_cycle(&policies).await;

        assert_eq!(report.evaluated, 1);
        assert_eq!(report.matched, 0);
        assert!(report.records.is_empty());
        assert_eq!(provider.deploy_call_count(), 0);
    }

    #[tokio::test]
    async fn test_compliant_resource_produces_no_deployment() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_resource(vault("australiaeast"));
        provider.put_subresource(
            "/sub/rg/vaults/vault-1",
            PROFILE,
            json!({
                "workspaceId": "/sub/rg/ws/central",
                "logs": { "enabled": "True" },
                "metrics": { "enabled": "False" },
            }),
        );
        let policies = vec![audit_policy(&[])];

        let report = runner(provider.clone(), &[]).run_cycle(&policies).await;

        assert_eq!(report.matched, 1);
        assert_eq!(report.compliant, 1);
        assert_eq!(report.remediated, 0);
        assert_eq!(provider.deploy_call_count(), 0);

        let record = &report.records[0];
        assert!(record.compliant);
        let outcome = record.outcome.as_ref().unwrap();
        assert_eq!(outcome.status, DeploymentStatus::Skipped);
    }

    #[tokio::test]
    async fn test_missing_role_fails_without_deployment() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_resource(vault("australiaeast"));
        let policies = vec![audit_policy(&["monitoring", "log-analytics"])];

        // Only one of the two required roles is granted
        let report = runner(provider.clone(), &["monitoring"])
            .run_cycle(&policies)
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.remediated, 0);
        assert_eq!(provider.deploy_call_count(), 0);

        let outcome = report.records[0].outcome.as_ref().unwrap();
        assert_eq!(
            outcome.error.as_ref().unwrap().kind,
            FailureKind::PermissionDenied
        );
    }

    struct FlakyBackend {
        inner: Arc<InMemoryProvider>,
        failures_left: AtomicU64,
    }

    #[async_trait]
    impl DeploymentBackend for FlakyBackend {
        async fn deploy(
            &self,
            template_id: &str,
            parameters: &remedy_hub_core::DeploymentParameters,
            target: &str,
            mode: DeploymentMode,
        ) -> Result<(), ProviderError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ProviderError::Transient("throttled".to_string()));
            }
            self.inner.deploy(template_id, parameters, target, mode).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_with_backoff() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_resource(vault("australiaeast"));
        let backend = Arc::new(FlakyBackend {
            inner: provider.clone(),
            failures_left: AtomicU64::new(2),
        });
        let policies = vec![audit_policy(&[])];

        let runner = CycleRunner::new(
            provider.clone(),
            Arc::new(ExistenceEvaluator::new(provider.clone())),
            Arc::new(DeploymentExecutor::new(backend, Vec::new())),
            Arc::new(BufferedAuditSink::new(provider.clone())),
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        });

        let report = runner.run_cycle(&policies).await;

        assert_eq!(report.remediated, 1);
        assert!(provider.subresource("/sub/rg/vaults/vault-1", PROFILE).is_some());
    }

    struct BrokenLookup;

    #[async_trait]
    impl SubresourceLookup for BrokenLookup {
        async fn fetch_subresource(
            &self,
            _parent_id: &str,
            _name: &str,
        ) -> Result<Option<serde_json::Value>, ProviderError> {
            Err(ProviderError::Transient("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_lookup_error_defers_the_resource() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.add_resource(vault("australiaeast"));
        let policies = vec![audit_policy(&[])];

        let runner = CycleRunner::new(
            provider.clone(),
            Arc::new(ExistenceEvaluator::new(Arc::new(BrokenLookup))),
            Arc::new(DeploymentExecutor::new(provider.clone(), Vec::new())),
            Arc::new(BufferedAuditSink::new(provider.clone())),
        );

        let report = runner.run_cycle(&policies).await;

        assert_eq!(report.errors, 1);
        assert_eq!(report.remediated, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(provider.deploy_call_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_handles_many_resources() {
        let provider = Arc::new(InMemoryProvider::new());
        for i in 0..20 {
            provider.add_resource(ResourceDescriptor {
                id: format!("/sub/rg/vaults/vault-{i}"),
                name: format!("vault-{i}"),
                resource_type: "Vendor.KeyVault/vaults".to_string(),
                location: "australiaeast".to_string(),
                properties: serde_json::Value::Null,
            });
        }
        let policies = vec![audit_policy(&[])];

        let report = runner(provider.clone(), &[]).run_cycle(&policies).await;

        assert_eq!(report.evaluated, 20);
        assert_eq!(report.remediated, 20);
        assert_eq!(provider.deploy_call_count(), 20);
    }
}
