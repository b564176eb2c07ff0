//! Remedy Hub API Server
//!
//! REST API for registering policies, triggering compliance cycles,
//! and retrieving cycle reports.

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Policies
        .route("/api/policies", post(handlers::create_policy).get(handlers::list_policies))
        .route("/api/policies/:id", get(handlers::get_policy))
        // Compliance cycles
        .route("/api/cycles", post(handlers::run_cycle))
        .route("/api/reports/latest", get(handlers::latest_report))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
