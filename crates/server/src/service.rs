//! # Recommender Service
//!
//! The one object request handlers talk to. It owns the model slot, the
//! three engines that read from it, and the artifact path that `reload`
//! re-reads.
//!
//! ```ignore
//! let store: Arc<dyn RatingStore> = Arc::new(RatingIndex::load_from_file(ratings)?);
//! let service = RecommenderService::open(store, "models/artifact.json");
//! let recs = service.recommend(42, 10)?;
//! ```

use crate::error::Result;
use crate::popularity::PopularityFallback;
use crate::recommend::RecommendationEngine;
use crate::similarity::SimilarityEngine;
use crate::state::ModelSlot;
use crate::types::{EngineStatus, PopularMovie, Recommendation, SimilarMovie};
use data_loader::{MovieId, RatingStore, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Facade over the serving engines. Cheap to clone; clones share the model.
#[derive(Clone)]
pub struct RecommenderService {
    artifact_path: PathBuf,
    model: Arc<ModelSlot>,
    recommendations: RecommendationEngine,
    similarity: SimilarityEngine,
    popularity: PopularityFallback,
}

impl RecommenderService {
    /// Service in the `Unloaded` state; call [`Self::reload`] to load the artifact
    pub fn new(store: Arc<dyn RatingStore>, artifact_path: impl Into<PathBuf>) -> Self {
        let model = Arc::new(ModelSlot::new());
        Self {
            artifact_path: artifact_path.into(),
            recommendations: RecommendationEngine::new(Arc::clone(&model), Arc::clone(&store)),
            similarity: SimilarityEngine::new(Arc::clone(&model)),
            popularity: PopularityFallback::new(store),
            model,
        }
    }

    /// Construct and load in one step. Never fails: a bad artifact leaves
    /// the service `Degraded`.
    pub fn open(store: Arc<dyn RatingStore>, artifact_path: impl Into<PathBuf>) -> Self {
        let service = Self::new(store, artifact_path);
        service.reload();
        service
    }

    /// Re-read the artifact and swap it in
    #[instrument(skip(self), fields(path = %self.artifact_path.display()))]
    pub fn reload(&self) -> EngineStatus {
        self.model.load_from(&self.artifact_path)
    }

    pub fn status(&self) -> EngineStatus {
        self.model.status()
    }

    /// Why the last load failed, while `Degraded`
    pub fn degraded_reason(&self) -> Option<String> {
        self.model.degraded_reason()
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn recommend(&self, user_id: UserId, n: usize) -> Result<Vec<Recommendation>> {
        self.recommendations.recommend(user_id, n)
    }

    pub fn similar(&self, movie_id: MovieId, n: usize) -> Result<Vec<SimilarMovie>> {
        self.similarity.similar(movie_id, n)
    }

    pub fn popular(&self, n: usize) -> Result<Vec<PopularMovie>> {
        self.popularity.popular(n)
    }
}
