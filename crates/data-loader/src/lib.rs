//! # Data Loader Crate
//!
//! Rating data for the recommender: the typed rating record, the
//! `RatingStore` seam that training and serving read through, and an
//! in-memory store that can be filled from a MovieLens ratings file.
//!
//! ## Main Components
//!
//! - **types**: `RatingRecord`, id aliases, `RatingIndex`
//! - **parser**: Parse `ratings.dat` / `ratings.csv` into records
//! - **index**: Loading and query logic for `RatingIndex`
//! - **store**: The `RatingStore` trait
//! - **error**: Error types for loading and store access
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{RatingIndex, RatingStore};
//! use std::path::Path;
//!
//! let index = RatingIndex::load_from_file(Path::new("data/ml-latest-small/ratings.csv"))?;
//! let seen = index.rated_movie_ids(1)?;
//! let top = index.popularity_counts(10)?;
//! ```

// Public modules
pub mod error;
pub mod index;
pub mod parser;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result, StoreError};
pub use parser::{parse_ratings, RatingsFormat};
pub use store::RatingStore;
pub use types::{
    latest_ratings, MovieId, RatingIndex, RatingRecord, UserId, MAX_RATING, MIN_RATING,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_index_creation() {
        let index = RatingIndex::new();
        let (users, movies, ratings) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(movies, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_rating() {
        let mut index = RatingIndex::new();

        index.insert_rating(RatingRecord {
            user_id: 1,
            movie_id: 1193,
            rating: 5.0,
            timestamp: 978300760,
        });

        assert_eq!(index.rating_count(1193), 1);
        assert!(index.rated_movies(1).contains(&1193));
    }

    #[test]
    fn test_empty_queries() {
        let index = RatingIndex::new();

        assert!(index.get_rating(999, 1).is_none());
        assert!(index.rated_movies(999).is_empty());
        assert!(index.most_rated(5).is_empty());
        assert_eq!(index.rating_count(999), 0);
    }
}
