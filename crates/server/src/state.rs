//! The served model and its lifecycle.
//!
//! A [`ModelSlot`] holds one of `Unloaded`, `Loaded` or `Degraded`. Loading
//! parses and checks the artifact outside the lock; the lock is only taken
//! to swap the state in, and readers only hold it long enough to clone the
//! `Arc` out. A failed load replaces whatever was there with `Degraded`, so
//! a bad artifact is never partially served. Reloads are serialized, so the
//! state always reflects the reload that finished last.

use crate::types::EngineStatus;
use data_loader::{MovieId, UserId};
use model::{clip_rating, ArtifactError, ModelArtifact};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// An artifact ready for queries: id lookups and item norms precomputed
#[derive(Debug)]
pub struct LoadedModel {
    artifact: ModelArtifact,
    user_index: HashMap<UserId, usize>,
    movie_index: HashMap<MovieId, usize>,
    item_norms: Vec<f64>,
}

impl LoadedModel {
    /// Validate `artifact` and build the lookup tables.
    ///
    /// Besides [`ModelArtifact::validate`], rejects embeddings so large that
    /// a prediction could overflow.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ArtifactError> {
        artifact.validate()?;

        let item_norms: Vec<f64> = artifact
            .item_embeddings
            .columns()
            .into_iter()
            .map(|col| col.dot(&col).sqrt())
            .collect();
        let max_item = item_norms.iter().copied().fold(0.0f64, f64::max);
        let max_user = artifact
            .user_embeddings
            .rows()
            .into_iter()
            .map(|row| row.dot(&row).sqrt())
            .fold(0.0f64, f64::max);
        // |u . v| <= |u| |v|, so a finite bound keeps every score finite
        if !(max_item * max_user).is_finite() {
            return Err(ArtifactError::Invalid(
                "embedding norms overflow; predictions would not be finite".into(),
            ));
        }

        let user_index = artifact
            .user_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        let movie_index = artifact
            .movie_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        Ok(Self {
            artifact,
            user_index,
            movie_index,
            item_norms,
        })
    }

    /// Read, validate and index the artifact at `path`
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Self::from_artifact(ModelArtifact::load(path)?)
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn rank(&self) -> usize {
        self.artifact.rank
    }

    /// Movie ids in column order
    pub fn movie_ids(&self) -> &[MovieId] {
        &self.artifact.movie_ids
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    pub fn knows_movie(&self, movie_id: MovieId) -> bool {
        self.movie_index.contains_key(&movie_id)
    }

    /// Clipped predicted rating for every movie, in [`Self::movie_ids`] order.
    ///
    /// `None` for users the artifact has no row for.
    pub fn predict_user(&self, user_id: UserId) -> Option<Vec<f64>> {
        let row = *self.user_index.get(&user_id)?;
        let mean = self
            .artifact
            .user_means
            .get(&user_id)
            .copied()
            .unwrap_or(self.artifact.global_mean);
        let deviations = self
            .artifact
            .user_embeddings
            .row(row)
            .dot(&self.artifact.item_embeddings);
        Some(deviations.iter().map(|d| clip_rating(d + mean)).collect())
    }

    /// Cosine similarity of `movie_id` against every movie column, itself included.
    ///
    /// Zero-norm columns score 0 against everything.
    pub fn cosine_scores(&self, movie_id: MovieId) -> Option<Vec<f64>> {
        let col = *self.movie_index.get(&movie_id)?;
        let items = &self.artifact.item_embeddings;
        let target = items.column(col);
        let target_norm = self.item_norms[col];

        let scores = items
            .columns()
            .into_iter()
            .zip(&self.item_norms)
            .map(|(other, &norm)| {
                if target_norm == 0.0 || norm == 0.0 {
                    0.0
                } else {
                    (target.dot(&other) / (target_norm * norm)).clamp(-1.0, 1.0)
                }
            })
            .collect();
        Some(scores)
    }
}

/// Internal state of a [`ModelSlot`]
#[derive(Debug, Clone)]
pub enum ModelState {
    Unloaded,
    Loaded(Arc<LoadedModel>),
    Degraded { reason: String },
}

impl ModelState {
    pub fn status(&self) -> EngineStatus {
        match self {
            ModelState::Unloaded => EngineStatus::Unloaded,
            ModelState::Loaded(_) => EngineStatus::Loaded,
            ModelState::Degraded { .. } => EngineStatus::Degraded,
        }
    }
}

/// Shared holder of the current model; one per process, handed to every engine
#[derive(Debug)]
pub struct ModelSlot {
    state: RwLock<ModelState>,
    /// Held across load and swap so overlapping reloads cannot land out of order
    reload_lock: Mutex<()>,
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ModelState::Unloaded),
            reload_lock: Mutex::new(()),
        }
    }

    /// The model to serve from, if one is loaded
    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        match &*self.state.read() {
            ModelState::Loaded(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.state.read().status()
    }

    /// Why the last load failed, while `Degraded`
    pub fn degraded_reason(&self) -> Option<String> {
        match &*self.state.read() {
            ModelState::Degraded { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    /// Install an already loaded model
    pub fn install(&self, model: LoadedModel) {
        let _reload = self.reload_lock.lock();
        *self.state.write() = ModelState::Loaded(Arc::new(model));
    }

    /// Load the artifact at `path` and swap it in; on failure go `Degraded`
    pub fn load_from(&self, path: &Path) -> EngineStatus {
        let _reload = self.reload_lock.lock();
        let next = match LoadedModel::load(path) {
            Ok(model) => {
                info!(
                    "Loaded model from {:?}: rank {}, {} users, {} movies",
                    path,
                    model.rank(),
                    model.artifact().user_ids.len(),
                    model.movie_ids().len()
                );
                ModelState::Loaded(Arc::new(model))
            }
            Err(e) => {
                warn!(
                    "Failed to load model from {:?}: {}; serving popularity results",
                    path, e
                );
                ModelState::Degraded {
                    reason: e.to_string(),
                }
            }
        };
        let status = next.status();
        *self.state.write() = next;
        status
    }
}
