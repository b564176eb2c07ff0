//! Deployment executor with per-key intent serialization

use parking_lot::Mutex;
use remedy_hub_core::{DeploymentOutcome, FailureKind, RemediationIntent};
use remedy_hub_provider::{DeploymentBackend, DeploymentMode, ProviderError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(60);

/// Applies remediation intents through the deployment backend.
///
/// Deployments run under a pre-authorized identity: the executor
/// checks the intent's required roles against the roles granted at
/// construction and never requests elevation. Attempts for the same
/// deployment key are serialized so overlapping remediation cannot
/// race on provider state; distinct keys proceed in parallel.
///
/// Failures are reported in the outcome rather than as errors, and
/// are not retried here; retry policy belongs to the calling control
/// loop.
pub struct DeploymentExecutor {
    backend: Arc<dyn DeploymentBackend>,
    granted_roles: HashSet<String>,
    timeout: Duration,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeploymentExecutor {
    pub fn new(
        backend: Arc<dyn DeploymentBackend>,
        granted_roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::with_timeout(backend, granted_roles, DEFAULT_DEPLOY_TIMEOUT)
    }

    pub fn with_timeout(
        backend: Arc<dyn DeploymentBackend>,
        granted_roles: impl IntoIterator<Item = String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            granted_roles: granted_roles.into_iter().collect(),
            timeout,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one remediation intent, returning the outcome.
    ///
    /// The deployment is incremental: it creates or updates the
    /// declared sub-resource and leaves sibling configuration on the
    /// parent untouched. Re-applying an intent whose target already
    /// matches is a no-op on observable state; the declarative write
    /// is still issued.
    pub async fn apply(&self, intent: &RemediationIntent) -> DeploymentOutcome {
        if let Some(missing) = intent
            .required_roles
            .iter()
            .find(|role| !self.granted_roles.contains(*role))
        {
            return DeploymentOutcome::failed(
                intent,
                FailureKind::PermissionDenied,
                format!("identity lacks required role {missing}"),
            );
        }

        let key = intent.deployment_key();
        let lock = self.lock_for(&key);
        let guard = lock.lock().await;

        tracing::debug!("Deploying {} for template {}", key, intent.template_id);

        let template_id = intent.template_id.to_string();
        let deploy = self.backend.deploy(
            &template_id,
            &intent.parameters,
            &intent.resource_id,
            DeploymentMode::Incremental,
        );

        let outcome = match tokio::time::timeout(self.timeout, deploy).await {
            Err(_) => DeploymentOutcome::failed(
                intent,
                FailureKind::Transient,
                format!("deployment timed out after {:?}", self.timeout),
            ),
            Ok(Err(err)) => DeploymentOutcome::failed(intent, classify(&err), err.to_string()),
            Ok(Ok(())) => DeploymentOutcome::succeeded(intent),
        };

        drop(guard);
        drop(lock);
        self.prune(&key);

        outcome
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock();
        in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the registry entry once no attempt holds it. An entry
    /// left behind by a cancelled attempt is reclaimed by the next
    /// attempt for the same key.
    fn prune(&self, key: &str) {
        let mut in_flight = self.in_flight.lock();
        if let Some(entry) = in_flight.get(key) {
            if Arc::strong_count(entry) == 1 {
                in_flight.remove(key);
            }
        }
    }
}

fn classify(err: &ProviderError) -> FailureKind {
    match err {
        ProviderError::PermissionDenied(_) => FailureKind::PermissionDenied,
        ProviderError::Validation(_) | ProviderError::Serialization(_) => FailureKind::Validation,
        ProviderError::Transient(_) | ProviderError::Internal(_) => FailureKind::Transient,
    }
}
