//! The rating store seam.
//!
//! Training reads every rating through [`RatingStore::fetch_all`]; serving
//! only ever asks for a user's exclusion set and for popularity counts.
//! Anything durable (a database, a remote service) plugs in by implementing
//! this trait. [`RatingIndex`] is the in-memory implementation.

use crate::error::StoreError;
use crate::types::{MovieId, RatingIndex, RatingRecord, UserId};
use std::collections::HashSet;

/// Source of rating data for training and serving.
///
/// `Send + Sync` so one store can sit behind an `Arc` shared by every
/// request handler.
pub trait RatingStore: Send + Sync {
    /// Every current rating record
    fn fetch_all(&self) -> Result<Vec<RatingRecord>, StoreError>;

    /// Movies the user has already rated
    fn rated_movie_ids(&self, user_id: UserId) -> Result<HashSet<MovieId>, StoreError>;

    /// Up to `n` (movie_id, rating count) pairs, count descending then
    /// movie id ascending.
    ///
    /// The cut at `n` must follow that order, ties at the boundary included.
    fn popularity_counts(&self, n: usize) -> Result<Vec<(MovieId, u32)>, StoreError>;
}

impl RatingStore for RatingIndex {
    fn fetch_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        Ok(self.all_ratings())
    }

    fn rated_movie_ids(&self, user_id: UserId) -> Result<HashSet<MovieId>, StoreError> {
        Ok(self.rated_movies(user_id))
    }

    fn popularity_counts(&self, n: usize) -> Result<Vec<(MovieId, u32)>, StoreError> {
        Ok(self.most_rated(n))
    }
}

impl<S: RatingStore + ?Sized> RatingStore for std::sync::Arc<S> {
    fn fetch_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        (**self).fetch_all()
    }

    fn rated_movie_ids(&self, user_id: UserId) -> Result<HashSet<MovieId>, StoreError> {
        (**self).rated_movie_ids(user_id)
    }

    fn popularity_counts(&self, n: usize) -> Result<Vec<(MovieId, u32)>, StoreError> {
        (**self).popularity_counts(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_index_as_store() {
        let index = RatingIndex::from_records(vec![
            RatingRecord::new(1, 1, 4.0, 1),
            RatingRecord::new(2, 1, 3.0, 1),
            RatingRecord::new(2, 2, 5.0, 1),
        ]);
        let store: Arc<dyn RatingStore> = Arc::new(index);

        assert_eq!(store.fetch_all().unwrap().len(), 3);
        assert_eq!(store.rated_movie_ids(2).unwrap().len(), 2);
        assert_eq!(store.popularity_counts(1).unwrap(), vec![(1, 2)]);
    }

    #[test]
    fn test_popularity_cut_breaks_ties_by_id() {
        let index = RatingIndex::from_records(vec![
            RatingRecord::new(1, 5, 4.0, 1),
            RatingRecord::new(2, 5, 4.0, 1),
            RatingRecord::new(1, 3, 4.0, 1),
            RatingRecord::new(2, 3, 4.0, 1),
            RatingRecord::new(1, 1, 4.0, 1),
        ]);
        assert_eq!(index.popularity_counts(1).unwrap(), vec![(3, 2)]);
        assert_eq!(index.popularity_counts(2).unwrap(), vec![(3, 2), (5, 2)]);
    }
}
