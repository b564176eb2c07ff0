//! Remedy Hub - Main Application Entry Point
//!
//! A declarative compliance and remediation engine: resources are
//! evaluated against registered policies on a periodic cycle and
//! non-compliant ones are remediated through templated deployments.

use anyhow::Context;
use remedy_hub_api::AppState;
use remedy_hub_core::{CreatePolicyRequest, PolicyDefinition};
use remedy_hub_cycle::Scheduler;
use remedy_hub_provider::InMemoryProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,remedy_hub=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .context("PORT must be a valid u16")?;

    tracing::info!("Starting Remedy Hub server on {}:{}", host, port);

    // Roles pre-granted to the deploying identity; the engine never
    // escalates beyond this grant
    let granted_roles: Vec<String> = std::env::var("GRANTED_ROLES")
        .map(|raw| {
            raw.split(',')
                .map(|role| role.trim().to_string())
                .filter(|role| !role.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if granted_roles.is_empty() {
        tracing::warn!("No roles granted (GRANTED_ROLES empty); policies requiring roles will fail remediation");
    }

    // Initialize the provider backend
    let provider_type = std::env::var("PROVIDER_TYPE").unwrap_or_else(|_| "memory".to_string());
    if provider_type != "memory" {
        anyhow::bail!("Unknown provider type '{}'", provider_type);
    }
    tracing::info!("Initializing in-memory provider...");
    let provider = Arc::new(InMemoryProvider::new());

    // Create shared application state
    let app_state = Arc::new(AppState::with_provider(provider, granted_roles));

    // Preload policies from file, if configured
    if let Ok(path) = std::env::var("POLICY_FILE") {
        let count = load_policies(&app_state, &path)
            .await
            .with_context(|| format!("Failed to load policies from {}", path))?;
        tracing::info!("Loaded {} policies from {}", count, path);
    }

    // Spawn the periodic scheduler unless disabled
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval_secs = std::env::var("CYCLE_INTERVAL_SECS")
        .unwrap_or_else(|_| "300".to_string())
        .parse::<u64>()
        .context("CYCLE_INTERVAL_SECS must be a valid u64")?;

    if interval_secs > 0 {
        let scheduler = Scheduler::new(
            app_state.runner.clone(),
            app_state.policies.clone(),
            app_state.last_report.clone(),
            Duration::from_secs(interval_secs),
            shutdown_rx,
        );
        tokio::spawn(scheduler.run());
        tracing::info!("Compliance cycle scheduled every {}s", interval_secs);
    } else {
        tracing::info!("Periodic cycles disabled; trigger via POST /api/cycles");
    }

    // Build our application with routes
    let app = remedy_hub_api::create_router(app_state);

    // Run it
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

/// Load policy requests from a JSON file into the registry
async fn load_policies(state: &AppState, path: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let requests: Vec<CreatePolicyRequest> = serde_json::from_str(&raw)?;

    let mut policies = state.policies.write().await;
    let mut count = 0;
    for req in requests {
        let policy = PolicyDefinition::new(req)?;
        tracing::debug!("Loaded policy '{}'", policy.name);
        policies.push(Arc::new(policy));
        count += 1;
    }
    Ok(count)
}
