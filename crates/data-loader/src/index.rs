//! RatingIndex building and query logic.
//!
//! - Load a ratings file into the in-memory index
//! - Rank movies by how many users rated them
//! - Validate data integrity

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

impl RatingIndex {
    /// Load a ratings file (`.dat` or `.csv`) into a new index
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading ratings from {:?}", path);

        let ratings = parser::parse_ratings(path)?;
        let parsed = ratings.len();
        let index = Self::from_records(ratings);
        index.validate()?;

        let (users, movies, kept) = index.counts();
        info!(
            "Loaded {} ratings ({} after superseding) from {} users over {} movies",
            parsed, kept, users, movies
        );
        Ok(index)
    }

    /// All current ratings, ordered by (user_id, movie_id)
    pub fn all_ratings(&self) -> Vec<RatingRecord> {
        let mut out: Vec<RatingRecord> = self
            .user_ratings
            .values()
            .flat_map(|per_user| per_user.values().copied())
            .collect();
        out.par_sort_unstable_by_key(|r| (r.user_id, r.movie_id));
        out
    }

    /// Every user with at least one rating, ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_ratings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Movie ids the user has rated (empty for unknown users)
    pub fn rated_movies(&self, user_id: UserId) -> HashSet<MovieId> {
        self.user_ratings
            .get(&user_id)
            .map(|per_user| per_user.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The `n` most-rated movies, count descending then movie id ascending
    pub fn most_rated(&self, n: usize) -> Vec<(MovieId, u32)> {
        let mut ranked: Vec<(MovieId, u32)> = self
            .movie_counts
            .iter()
            .map(|(&movie_id, &count)| (movie_id, count))
            .collect();
        ranked.par_sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Validate data integrity
    ///
    /// Every stored rating must lie in the half-star range.
    pub fn validate(&self) -> Result<()> {
        for per_user in self.user_ratings.values() {
            for rating in per_user.values() {
                if !rating.is_valid() {
                    return Err(DataLoadError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.rating.to_string(),
                        line: 0,
                    });
                }
            }
        }
        Ok(())
    }
}
