//! Application state shared across handlers

use remedy_hub_cycle::{BufferedAuditSink, CycleRunner, PolicyRegistry, SharedReport};
use remedy_hub_deploy::DeploymentExecutor;
use remedy_hub_engine::ExistenceEvaluator;
use remedy_hub_provider::{InMemoryProvider, Provider};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
pub struct AppState {
    pub policies: PolicyRegistry,
    pub runner: Arc<CycleRunner>,
    pub last_report: SharedReport,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_provider(Arc::new(InMemoryProvider::new()), Vec::new())
    }

    /// Create with a custom provider backend and the role grant the
    /// deploying identity holds
    pub fn with_provider(provider: Arc<dyn Provider>, granted_roles: Vec<String>) -> Self {
        let evaluator = Arc::new(ExistenceEvaluator::new(provider.clone()));
        let executor = Arc::new(DeploymentExecutor::new(provider.clone(), granted_roles));
        let audit = Arc::new(BufferedAuditSink::new(provider.clone()));

        let runner = Arc::new(CycleRunner::new(provider, evaluator, executor, audit));

        Self {
            policies: Arc::new(RwLock::new(Vec::new())),
            runner,
            last_report: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
