//! Errors surfaced to callers of the serving API.
//!
//! Artifact problems never show up here: they move the engine to
//! `Degraded` and requests fall back to popularity.

use data_loader::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServeError {
    /// The rating store could not answer; not retried
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// Result count must be at least 1
    #[error("invalid limit: n must be at least 1")]
    InvalidLimit,
}

/// Convenience alias for serving results
pub type Result<T> = std::result::Result<T, ServeError>;
