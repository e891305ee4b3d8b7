//! Error types for the resolution layer.
//!
//! Per-host probe failures are data, not errors: they land in the emitted
//! record as a `ProbeStatus`. `ResolveError` is reserved for failures of the
//! machinery itself.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] fedifinder_store::StoreError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Seed endpoint answered {0}")]
    SeedRejected(reqwest::StatusCode),
}
