//! Popularity fallback: most-rated movies, independent of any model.

use crate::error::{Result, ServeError};
use crate::types::PopularMovie;
use data_loader::RatingStore;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Ranks movies by rating count; always available while the store is
#[derive(Clone)]
pub struct PopularityFallback {
    store: Arc<dyn RatingStore>,
}

impl PopularityFallback {
    pub fn new(store: Arc<dyn RatingStore>) -> Self {
        Self { store }
    }

    /// Top `n` movies by count descending, ties by movie id ascending
    #[instrument(skip(self))]
    pub fn popular(&self, n: usize) -> Result<Vec<PopularMovie>> {
        if n == 0 {
            return Err(ServeError::InvalidLimit);
        }

        let mut counts = self.store.popularity_counts(n)?;
        // the cut at n is the store's (see `RatingStore::popularity_counts`);
        // this only fixes the order within it
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(n);

        debug!("Serving {} popular movies", counts.len());
        Ok(counts
            .into_iter()
            .map(|(movie_id, count)| PopularMovie { movie_id, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{MovieId, RatingIndex, RatingRecord, StoreError, UserId};
    use std::collections::HashSet;

    /// Hands back counts in whatever order it was given
    struct FixedCounts(Vec<(MovieId, u32)>);

    impl RatingStore for FixedCounts {
        fn fetch_all(&self) -> std::result::Result<Vec<RatingRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn rated_movie_ids(&self, _: UserId) -> std::result::Result<HashSet<MovieId>, StoreError> {
            Ok(HashSet::new())
        }

        fn popularity_counts(&self, _: usize) -> std::result::Result<Vec<(MovieId, u32)>, StoreError> {
            Ok(self.0.clone())
        }
    }

    fn index_with_counts(counts: &[(MovieId, u32)]) -> RatingIndex {
        let mut index = RatingIndex::new();
        for &(movie_id, count) in counts {
            for user_id in 0..count {
                index.insert_rating(RatingRecord::new(user_id, movie_id, 4.0, 0));
            }
        }
        index
    }

    #[test]
    fn test_popular_two_of_three() {
        let fallback = PopularityFallback::new(Arc::new(index_with_counts(&[(1, 10), (2, 5), (3, 1)])));
        assert_eq!(
            fallback.popular(2).unwrap(),
            vec![
                PopularMovie { movie_id: 1, count: 10 },
                PopularMovie { movie_id: 2, count: 5 },
            ]
        );
    }

    #[test]
    fn test_ties_and_unordered_store() {
        let store = FixedCounts(vec![(9, 3), (4, 3), (7, 8), (1, 1), (2, 3)]);
        let fallback = PopularityFallback::new(Arc::new(store));
        let ids: Vec<MovieId> = fallback.popular(4).unwrap().iter().map(|p| p.movie_id).collect();
        assert_eq!(ids, vec![7, 2, 4, 9]);
    }

    #[test]
    fn test_zero_limit() {
        let fallback = PopularityFallback::new(Arc::new(RatingIndex::new()));
        assert_eq!(fallback.popular(0), Err(ServeError::InvalidLimit));
        assert!(fallback.popular(3).unwrap().is_empty());
    }
}
