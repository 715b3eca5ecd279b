//! # Model Crate
//!
//! Offline matrix-factorization training and the artifact it publishes.
//!
//! ## Main Components
//!
//! - **trainer**: `Trainer` runs a training job end to end
//! - **artifact**: `ModelArtifact` and its versioned, atomically published file
//! - **svd**: Seeded randomized truncated SVD
//! - **sparse**: CSR matrix for the centered ratings
//! - **evaluation**: Holdout split and MAE/RMSE reporting
//! - **config**: `TrainerConfig`
//! - **error**: `TrainError` and `ArtifactError`
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::RatingIndex;
//! use model::{Trainer, TrainerConfig};
//! use std::path::Path;
//!
//! let store = RatingIndex::load_from_file(Path::new("data/ratings.csv"))?;
//! let outcome = Trainer::new(TrainerConfig::default())
//!     .train(&store, Path::new("models/artifact.json"))?;
//! if let Some(report) = outcome.evaluation {
//!     println!("{report}");
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod sparse;
pub mod svd;
pub mod trainer;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT, ARTIFACT_VERSION};
pub use config::TrainerConfig;
pub use error::{ArtifactError, Result, TrainError};
pub use evaluation::{ErrorMetrics, EvaluationReport};
pub use trainer::{clip_rating, Trainer, TrainingOutcome};
