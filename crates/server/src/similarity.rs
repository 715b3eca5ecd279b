//! Item-to-item similarity over the learned item embeddings.

use crate::error::{Result, ServeError};
use crate::recommend::top_n;
use crate::state::ModelSlot;
use crate::types::SimilarMovie;
use data_loader::MovieId;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct SimilarityEngine {
    model: Arc<ModelSlot>,
}

impl SimilarityEngine {
    pub fn new(model: Arc<ModelSlot>) -> Self {
        Self { model }
    }

    /// The `n` movies whose embeddings are closest to `movie_id` by cosine.
    ///
    /// Empty when no model is loaded or the movie is not in it. Never
    /// includes `movie_id` itself. A linear scan over the catalog.
    #[instrument(skip(self))]
    pub fn similar(&self, movie_id: MovieId, n: usize) -> Result<Vec<SimilarMovie>> {
        if n == 0 {
            return Err(ServeError::InvalidLimit);
        }
        let Some(model) = self.model.current() else {
            debug!("No model loaded; no similar movies");
            return Ok(Vec::new());
        };
        let Some(scores) = model.cosine_scores(movie_id) else {
            debug!("Movie {} unknown to the model", movie_id);
            return Ok(Vec::new());
        };

        let mut scored: Vec<(MovieId, f64)> = model
            .movie_ids()
            .iter()
            .copied()
            .zip(scores)
            .filter(|&(other, _)| other != movie_id)
            .collect();
        top_n(&mut scored, n);

        Ok(scored
            .into_iter()
            .map(|(movie_id, score)| SimilarMovie { movie_id, score })
            .collect())
    }
}
