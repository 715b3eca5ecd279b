//! Error types for training and artifact handling.

use data_loader::StoreError;
use thiserror::Error;

/// Reasons an artifact cannot be read or written.
///
/// On the serving side every variant means the same thing: the engine
/// degrades to popularity results until the next successful reload.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Nothing at the configured path
    #[error("artifact not found at {path}")]
    NotFound { path: String },

    /// Reading, staging or publishing failed
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes are not a well-formed artifact document
    #[error("malformed artifact: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Document carries a different format tag
    #[error("unrecognised artifact format {found:?} (expected {expected:?})")]
    IncompatibleFormat { found: String, expected: &'static str },

    /// Document was written by an incompatible schema version
    #[error("artifact version {found} is not supported (expected {expected})")]
    IncompatibleVersion { found: u32, expected: u32 },

    /// Parsed, but the contents break an invariant (shape, ids, non-finite values)
    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// Errors that abort a training run
#[derive(Error, Debug)]
pub enum TrainError {
    /// No ratings to learn from
    #[error("insufficient data: training requires at least one rating")]
    InsufficientData,

    /// Trainer configuration out of range
    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(String),

    /// Another training job holds the lock for this artifact
    #[error("training already in progress (lock file {path} exists)")]
    TrainingInProgress { path: String },

    /// Factorization produced NaN or infinite values
    #[error("numeric failure during factorization: {0}")]
    Numeric(String),

    /// Rating store could not be read
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Artifact could not be published
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Lock file handling failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for training results
pub type Result<T> = std::result::Result<T, TrainError>;
