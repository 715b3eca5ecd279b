//! Core domain types for rating data.
//!
//! This module defines the fundamental data structures used throughout the system.
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (UserId, MovieId)
//! - Small `Copy` structs for records that are passed around by value
//! - HashMap-backed indices for O(1) lookups

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with movie IDs

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

/// Lowest rating a user can give (half-star scale)
pub const MIN_RATING: f32 = 0.5;

/// Highest rating a user can give
pub const MAX_RATING: f32 = 5.0;

// =============================================================================
// Rating Type
// =============================================================================

/// A single rating from a user for a movie.
///
/// Records are immutable. An updated rating is a new record for the same
/// (user_id, movie_id) pair; see [`RatingRecord::supersedes`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Rating value from 0.5 to 5.0
    pub rating: f32,
    /// Unix timestamp when rating was made
    pub timestamp: i64,
}

impl RatingRecord {
    pub fn new(user_id: UserId, movie_id: MovieId, rating: f32, timestamp: i64) -> Self {
        Self {
            user_id,
            movie_id,
            rating,
            timestamp,
        }
    }

    /// Whether this record replaces `older` for the same (user, movie) pair.
    ///
    /// Newer timestamps win. On equal timestamps the record seen later wins,
    /// so callers feeding records in arrival order get last-write-wins.
    pub fn supersedes(&self, older: &RatingRecord) -> bool {
        self.timestamp >= older.timestamp
    }

    /// Rating lies in the valid half-star range
    pub fn is_valid(&self) -> bool {
        self.rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&self.rating)
    }
}

/// Collapse superseded records so each (user, movie) pair appears once.
///
/// Output is ordered by (user_id, movie_id), which keeps downstream
/// processing independent of the order the store returned records in.
pub fn latest_ratings(records: impl IntoIterator<Item = RatingRecord>) -> Vec<RatingRecord> {
    let mut latest: HashMap<(UserId, MovieId), RatingRecord> = HashMap::new();
    for record in records {
        latest
            .entry((record.user_id, record.movie_id))
            .and_modify(|existing| {
                if record.supersedes(existing) {
                    *existing = record;
                }
            })
            .or_insert(record);
    }

    let mut out: Vec<RatingRecord> = latest.into_values().collect();
    out.sort_unstable_by_key(|r| (r.user_id, r.movie_id));
    out
}

// =============================================================================
// RatingIndex - The In-Memory Rating Store
// =============================================================================

/// In-memory rating store with per-user and per-movie indices.
///
/// Holds at most one record per (user, movie) pair: inserting a newer rating
/// for an existing pair replaces the old one without changing the movie's
/// rating count.
#[derive(Debug, Default)]
pub struct RatingIndex {
    /// Latest rating per movie, grouped by user
    pub(crate) user_ratings: HashMap<UserId, HashMap<MovieId, RatingRecord>>,
    /// Number of distinct users who rated each movie
    pub(crate) movie_counts: HashMap<MovieId, u32>,
}

impl RatingIndex {
    /// Creates a new, empty RatingIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a batch of records, applying supersede rules
    pub fn from_records(records: impl IntoIterator<Item = RatingRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert_rating(record);
        }
        index
    }

    /// Insert a rating, replacing an older rating for the same pair
    pub fn insert_rating(&mut self, rating: RatingRecord) {
        let per_user = self.user_ratings.entry(rating.user_id).or_default();
        match per_user.get_mut(&rating.movie_id) {
            Some(existing) => {
                if rating.supersedes(existing) {
                    *existing = rating;
                }
            }
            None => {
                per_user.insert(rating.movie_id, rating);
                *self.movie_counts.entry(rating.movie_id).or_insert(0) += 1;
            }
        }
    }

    /// Get the current rating a user gave a movie
    pub fn get_rating(&self, user_id: UserId, movie_id: MovieId) -> Option<&RatingRecord> {
        self.user_ratings.get(&user_id)?.get(&movie_id)
    }

    /// Number of users who rated the movie
    pub fn rating_count(&self, movie_id: MovieId) -> u32 {
        self.movie_counts.get(&movie_id).copied().unwrap_or(0)
    }

    /// Get counts for debugging/validation: (users, movies, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.user_ratings.len(), self.movie_counts.len(), total_ratings)
    }
}
