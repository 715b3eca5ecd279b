//! The persisted model artifact.
//!
//! On disk an artifact is a JSON document:
//!
//! ```text
//! { "format": "reel-recs/mf-artifact", "version": 1, "model": { ...ModelArtifact... } }
//! ```
//!
//! The header is read on its own first so a reader can refuse a document
//! from another schema before trying to interpret its body. Writes are
//! staged in a temporary file in the target directory and renamed over the
//! target, so readers see either the old artifact or the new one.

use crate::error::ArtifactError;
use data_loader::{MovieId, UserId};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Format tag written into every artifact header
pub const ARTIFACT_FORMAT: &str = "reel-recs/mf-artifact";

/// Current artifact schema version
pub const ARTIFACT_VERSION: u32 = 1;

/// Learned embeddings plus the statistics needed to turn them into ratings.
///
/// Row `i` of `user_embeddings` belongs to `user_ids[i]`; column `j` of
/// `item_embeddings` belongs to `movie_ids[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Embedding dimensionality `k`
    pub rank: usize,
    pub user_ids: Vec<UserId>,
    pub movie_ids: Vec<MovieId>,
    /// `len(user_ids) x k`
    pub user_embeddings: Array2<f64>,
    /// `k x len(movie_ids)`
    pub item_embeddings: Array2<f64>,
    pub user_means: BTreeMap<UserId, f64>,
    pub global_mean: f64,
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format: String,
    version: u32,
}

#[derive(Serialize)]
struct ArtifactEnvelopeRef<'a> {
    format: &'a str,
    version: u32,
    model: &'a ModelArtifact,
}

#[derive(Deserialize)]
struct ArtifactEnvelope {
    model: ModelArtifact,
}

impl ModelArtifact {
    /// Check shape, id uniqueness and that every number is finite
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.rank == 0 {
            return Err(ArtifactError::Invalid("rank must be at least 1".into()));
        }
        if self.user_ids.is_empty() || self.movie_ids.is_empty() {
            return Err(ArtifactError::Invalid(format!(
                "empty embeddings ({} users, {} movies)",
                self.user_ids.len(),
                self.movie_ids.len()
            )));
        }
        if self.user_embeddings.dim() != (self.user_ids.len(), self.rank) {
            return Err(ArtifactError::Invalid(format!(
                "user_embeddings shape {:?}, expected ({}, {})",
                self.user_embeddings.dim(),
                self.user_ids.len(),
                self.rank
            )));
        }
        if self.item_embeddings.dim() != (self.rank, self.movie_ids.len()) {
            return Err(ArtifactError::Invalid(format!(
                "item_embeddings shape {:?}, expected ({}, {})",
                self.item_embeddings.dim(),
                self.rank,
                self.movie_ids.len()
            )));
        }
        if has_duplicates(&self.user_ids) {
            return Err(ArtifactError::Invalid("duplicate user id".into()));
        }
        if has_duplicates(&self.movie_ids) {
            return Err(ArtifactError::Invalid("duplicate movie id".into()));
        }
        if !self.global_mean.is_finite() {
            return Err(ArtifactError::Invalid("global_mean is not finite".into()));
        }
        if self.user_embeddings.iter().any(|v| !v.is_finite()) {
            return Err(ArtifactError::Invalid("non-finite user embedding".into()));
        }
        if self.item_embeddings.iter().any(|v| !v.is_finite()) {
            return Err(ArtifactError::Invalid("non-finite item embedding".into()));
        }
        if let Some((user_id, _)) = self.user_means.iter().find(|(_, m)| !m.is_finite()) {
            return Err(ArtifactError::Invalid(format!(
                "non-finite mean for user {}",
                user_id
            )));
        }
        Ok(())
    }

    /// Serialize with the versioned header
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let envelope = ArtifactEnvelopeRef {
            format: ARTIFACT_FORMAT,
            version: ARTIFACT_VERSION,
            model: self,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Parse a versioned document, refusing other formats and versions
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let header: ArtifactHeader = serde_json::from_slice(bytes)?;
        if header.format != ARTIFACT_FORMAT {
            return Err(ArtifactError::IncompatibleFormat {
                found: header.format,
                expected: ARTIFACT_FORMAT,
            });
        }
        if header.version != ARTIFACT_VERSION {
            return Err(ArtifactError::IncompatibleVersion {
                found: header.version,
                expected: ARTIFACT_VERSION,
            });
        }

        let envelope: ArtifactEnvelope = serde_json::from_slice(bytes)?;
        envelope.model.validate()?;
        Ok(envelope.model)
    }

    /// Read and validate an artifact file
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::NotFound {
                path: path.display().to_string(),
            },
            _ => ArtifactError::Io(e),
        })?;
        debug!("Read {} artifact bytes from {:?}", bytes.len(), path);
        Self::from_json_slice(&bytes)
    }

    /// Write the artifact atomically: stage next to `path`, sync, rename over it
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        self.validate()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer(
                &mut writer,
                &ArtifactEnvelopeRef {
                    format: ARTIFACT_FORMAT,
                    version: ARTIFACT_VERSION,
                    model: self,
                },
            )?;
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| ArtifactError::Io(e.error))?;

        info!(
            "Published artifact to {:?} (rank {}, {} users, {} movies)",
            path,
            self.rank,
            self.user_ids.len(),
            self.movie_ids.len()
        );
        Ok(())
    }
}

fn has_duplicates(ids: &[u32]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().any(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> ModelArtifact {
        ModelArtifact {
            rank: 2,
            user_ids: vec![1, 2],
            movie_ids: vec![10, 20, 30],
            user_embeddings: array![[0.1, -0.2], [1.0 / 3.0, 2.5e-7]],
            item_embeddings: array![[0.5, 0.25, -0.125], [0.7, -0.1, 0.3]],
            user_means: BTreeMap::from([(1, 3.5), (2, 4.0 / 3.0)]),
            global_mean: 3.141592653589793,
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let artifact = sample();
        let bytes = artifact.to_json_bytes().unwrap();
        let back = ModelArtifact::from_json_slice(&bytes).unwrap();

        assert_eq!(back.rank, artifact.rank);
        assert_eq!(back.user_ids, artifact.user_ids);
        assert_eq!(back.movie_ids, artifact.movie_ids);
        for (a, b) in back.user_embeddings.iter().zip(artifact.user_embeddings.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in back.item_embeddings.iter().zip(artifact.item_embeddings.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        for (user_id, mean) in &artifact.user_means {
            assert!((back.user_means[user_id] - mean).abs() < 1e-9);
        }
        assert!((back.global_mean - artifact.global_mean).abs() < 1e-9);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("artifact.json");

        sample().save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, sample());

        // no staging files left behind
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }));
    }

    #[test]
    fn test_version_mismatch_refused() {
        let bytes = br#"{"format":"reel-recs/mf-artifact","version":99,"model":{}}"#;
        let err = ModelArtifact::from_json_slice(bytes).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::IncompatibleVersion { found: 99, expected: 1 }
        ));
    }

    #[test]
    fn test_foreign_format_refused() {
        let bytes = br#"{"format":"pickle","version":1}"#;
        let err = ModelArtifact::from_json_slice(bytes).unwrap_err();
        assert!(matches!(err, ArtifactError::IncompatibleFormat { .. }));
    }

    #[test]
    fn test_corrupt_bytes() {
        let err = ModelArtifact::from_json_slice(b"{\"format\": \"reel").unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed(_)));
    }

    #[test]
    fn test_validate_rejects_shape_mismatch() {
        let mut artifact = sample();
        artifact.movie_ids.push(40);
        assert!(matches!(artifact.validate(), Err(ArtifactError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut artifact = sample();
        artifact.item_embeddings[[0, 1]] = f64::NAN;
        assert!(matches!(artifact.validate(), Err(ArtifactError::Invalid(_))));

        let mut artifact = sample();
        artifact.user_means.insert(2, f64::INFINITY);
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        let mut artifact = sample();
        artifact.user_ids = vec![1, 1];
        assert!(artifact.validate().is_err());

        let empty = ModelArtifact {
            rank: 1,
            user_ids: vec![],
            movie_ids: vec![],
            user_embeddings: Array2::zeros((0, 1)),
            item_embeddings: Array2::zeros((1, 0)),
            user_means: BTreeMap::new(),
            global_mean: 3.0,
        };
        assert!(empty.validate().is_err());
    }
}
