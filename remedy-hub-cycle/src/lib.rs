//! Control loop for Remedy Hub
//!
//! Drives compliance cycles: one full pass listing resources,
//! evaluating them against the registered policies, and remediating
//! the non-compliant ones. Includes the buffered audit queue and the
//! periodic scheduler.

pub mod audit;
pub mod cycle;
pub mod scheduler;

pub use audit::BufferedAuditSink;
pub use cycle::{CycleRunner, RetryPolicy};
pub use scheduler::Scheduler;

use remedy_hub_core::{CycleReport, PolicyDefinition};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registered policies, shared between the API and the scheduler
pub type PolicyRegistry = Arc<RwLock<Vec<Arc<PolicyDefinition>>>>;

/// Latest completed cycle report
pub type SharedReport = Arc<RwLock<Option<CycleReport>>>;
