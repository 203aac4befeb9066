//! Cache error types.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a shared-tier backend.
///
/// Never escapes [`TieredCache`](super::TieredCache): it is logged, counted
/// and the lookup proceeds as a miss.
#[derive(Debug, Error)]
pub enum SharedTierError {
    #[error("shared tier unavailable: {0}")]
    Unavailable(String),

    #[error("shared tier call exceeded {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("shared tier serialization failed: {0}")]
    Serialization(String),
}

/// Error from the typed JSON helpers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cached value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cached value for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
