//! Personalized recommendations with popularity fallback.

use crate::error::{Result, ServeError};
use crate::popularity::PopularityFallback;
use crate::state::ModelSlot;
use crate::types::{Provenance, Recommendation};
use data_loader::{MovieId, RatingStore, UserId};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Serves `recommend` from whatever the [`ModelSlot`] currently holds
#[derive(Clone)]
pub struct RecommendationEngine {
    model: Arc<ModelSlot>,
    store: Arc<dyn RatingStore>,
    fallback: PopularityFallback,
}

impl RecommendationEngine {
    pub fn new(model: Arc<ModelSlot>, store: Arc<dyn RatingStore>) -> Self {
        let fallback = PopularityFallback::new(Arc::clone(&store));
        Self {
            model,
            store,
            fallback,
        }
    }

    /// Up to `n` unrated movies for `user_id`, best predicted first.
    ///
    /// Without a loaded model, or for a user the model has never seen, the
    /// most popular movies are returned instead, tagged
    /// [`Provenance::Popular`].
    #[instrument(skip(self))]
    pub fn recommend(&self, user_id: UserId, n: usize) -> Result<Vec<Recommendation>> {
        if n == 0 {
            return Err(ServeError::InvalidLimit);
        }

        let Some(model) = self.model.current() else {
            debug!("No model loaded, falling back to popularity");
            return self.popular(n);
        };
        let Some(predictions) = model.predict_user(user_id) else {
            debug!("User {} unknown to the model, falling back to popularity", user_id);
            return self.popular(n);
        };

        let rated = self.store.rated_movie_ids(user_id)?;
        let mut scored: Vec<(MovieId, f64)> = model
            .movie_ids()
            .iter()
            .copied()
            .zip(predictions)
            .filter(|(movie_id, _)| !rated.contains(movie_id))
            .collect();
        top_n(&mut scored, n);

        debug!(
            "Personalized {} movies for user {} ({} excluded as rated)",
            scored.len(),
            user_id,
            rated.len()
        );
        Ok(scored
            .into_iter()
            .map(|(movie_id, rating)| Recommendation {
                movie_id,
                predicted_rating: Some(rating),
                provenance: Provenance::Personalized,
            })
            .collect())
    }

    fn popular(&self, n: usize) -> Result<Vec<Recommendation>> {
        Ok(self
            .fallback
            .popular(n)?
            .into_iter()
            .map(|p| Recommendation {
                movie_id: p.movie_id,
                predicted_rating: None,
                provenance: Provenance::Popular,
            })
            .collect())
    }
}

/// Score descending, then movie id ascending
pub(crate) fn rank_order(a: &(MovieId, f64), b: &(MovieId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Keep the best `n` entries of `scored`, sorted by [`rank_order`]
pub(crate) fn top_n(scored: &mut Vec<(MovieId, f64)>, n: usize) {
    if scored.len() > n {
        scored.select_nth_unstable_by(n - 1, rank_order);
        scored.truncate(n);
    }
    scored.sort_unstable_by(rank_order);
}
