//! Core domain models for Remedy Hub
//!
//! This crate contains the shared data structures used across
//! the compliance engine: PolicyDefinition, ResourceDescriptor,
//! RemediationIntent, DeploymentOutcome, and AuditRecord.

pub mod error;
pub mod models;

pub use error::CoreError;
pub use models::*;
