//! API request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use remedy_hub_core::{CreatePolicyRequest, PolicyDefinition};
use std::sync::Arc;
use uuid::Uuid;

use crate::{ApiError, AppState};

// ==================== Policy Handlers ====================

/// Register a new policy
pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePolicyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = Arc::new(PolicyDefinition::new(req)?);

    state.policies.write().await.push(policy.clone());

    tracing::info!(
        "Registered policy '{}' targeting {}",
        policy.name,
        policy.scope.resource_type
    );

    Ok((StatusCode::CREATED, Json((*policy).clone())))
}

/// Get a policy by ID
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let policies = state.policies.read().await;

    match policies.iter().find(|p| p.id == id) {
        Some(policy) => Ok(Json((**policy).clone())),
        None => Err(ApiError::NotFound(format!("Policy {} not found", id))),
    }
}

/// List all registered policies
pub async fn list_policies(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let policies = state.policies.read().await;
    let listed: Vec<PolicyDefinition> = policies.iter().map(|p| (**p).clone()).collect();
    Ok(Json(listed))
}

// ==================== Cycle Handlers ====================

/// Run one compliance cycle over the registered policies
pub async fn run_cycle(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.policies.read().await.clone();

    let report = state.runner.run_cycle(&snapshot).await;
    *state.last_report.write().await = Some(report.clone());

    Ok(Json(report))
}

/// Get the latest completed cycle report
pub async fn latest_report(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    match state.last_report.read().await.clone() {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::NotFound(
            "No compliance cycle has completed yet".to_string(),
        )),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "remedy-hub"
    }))
}
