//! Response types shared by the engines.

use data_loader::MovieId;
use serde::Serialize;
use std::fmt;

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Scored by the factorization model for this user
    Personalized,
    /// Most-rated movies; no model or unknown user
    Popular,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Personalized => "personalized",
            Provenance::Popular => "popular",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub movie_id: MovieId,
    /// Clipped model prediction; absent for popularity results
    pub predicted_rating: Option<f64>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMovie {
    pub movie_id: MovieId,
    /// Cosine similarity in [-1, 1]
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PopularMovie {
    pub movie_id: MovieId,
    pub count: u32,
}

/// Lifecycle of the served model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// No load attempted yet
    Unloaded,
    /// An artifact is being served
    Loaded,
    /// The last load failed; popularity results only until a reload succeeds
    Degraded,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStatus::Unloaded => "unloaded",
            EngineStatus::Loaded => "loaded",
            EngineStatus::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_serializes_lowercase() {
        let rec = Recommendation {
            movie_id: 7,
            predicted_rating: None,
            provenance: Provenance::Popular,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"movie_id":7,"predicted_rating":null,"provenance":"popular"}"#);
        assert_eq!(Provenance::Personalized.to_string(), "personalized");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(EngineStatus::Degraded.to_string(), "degraded");
        assert_eq!(serde_json::to_string(&EngineStatus::Loaded).unwrap(), r#""loaded""#);
    }
}
