//! Deployment execution for Remedy Hub
//!
//! Applies remediation intents through the deployment backend under
//! a pre-authorized identity, serializing attempts per deployment
//! key.

pub mod executor;

pub use executor::DeploymentExecutor;
