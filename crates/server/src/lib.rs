//! Serving side of the ReelRecs recommender.
//!
//! Loads the trained artifact into a shared [`ModelSlot`] and answers
//! recommendation, similarity and popularity queries from it. A missing or
//! broken artifact never fails a request: the engine goes `Degraded` and
//! recommendations come from [`PopularityFallback`].

pub mod error;
pub mod popularity;
pub mod recommend;
pub mod service;
pub mod similarity;
pub mod state;
pub mod types;

pub use error::{Result, ServeError};
pub use popularity::PopularityFallback;
pub use recommend::RecommendationEngine;
pub use service::RecommenderService;
pub use similarity::SimilarityEngine;
pub use state::{LoadedModel, ModelSlot, ModelState};
pub use types::{EngineStatus, PopularMovie, Provenance, Recommendation, SimilarMovie};
