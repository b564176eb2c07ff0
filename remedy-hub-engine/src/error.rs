//! Engine error types

use remedy_hub_provider::ProviderError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Sub-resource fetch failed for a reason other than "not found".
    /// Recoverable: the resource is retried on the next cycle rather
    /// than assumed non-compliant.
    #[error("Lookup failed for {resource_id}: {source}")]
    Lookup {
        resource_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Lookup timed out for {resource_id} after {after:?}")]
    LookupTimeout { resource_id: String, after: Duration },
}
