//! Offline training job.
//!
//! One run: collapse superseded ratings, hold out a seeded test split,
//! factor the user-centered train matrix, score the holdout, then refit on
//! everything and publish the artifact.

use crate::artifact::ModelArtifact;
use crate::config::TrainerConfig;
use crate::error::{Result, TrainError};
use crate::evaluation::{split_ratings, ErrorMetrics, EvaluationReport};
use crate::sparse::SparseMatrix;
use crate::svd::{truncated_svd, SvdParams};
use data_loader::{latest_ratings, MovieId, RatingRecord, RatingStore, UserId, MAX_RATING, MIN_RATING};
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Clip a raw prediction into the rating scale
pub fn clip_rating(value: f64) -> f64 {
    value.clamp(MIN_RATING as f64, MAX_RATING as f64)
}

/// Result of a successful [`Trainer::train`] run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The artifact that was published
    pub artifact: ModelArtifact,
    /// Holdout diagnostics; `None` when evaluation was disabled or impossible
    pub evaluation: Option<EvaluationReport>,
}

/// Factorization of one rating set, kept in memory.
///
/// Ids are ascending; `user_index`/`movie_index` map ids back to rows and
/// columns.
#[derive(Debug, Clone)]
struct FittedModel {
    rank: usize,
    user_ids: Vec<UserId>,
    movie_ids: Vec<MovieId>,
    user_index: HashMap<UserId, usize>,
    movie_index: HashMap<MovieId, usize>,
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
    user_means: BTreeMap<UserId, f64>,
}

impl FittedModel {
    /// Unclipped prediction, `None` unless both ids were in the fitted matrix
    fn predict(&self, user_id: UserId, movie_id: MovieId) -> Option<f64> {
        let row = *self.user_index.get(&user_id)?;
        let col = *self.movie_index.get(&movie_id)?;
        let deviation = self.user_factors.row(row).dot(&self.item_factors.column(col));
        let mean = self.user_means.get(&user_id).copied()?;
        Some(deviation + mean)
    }

    fn into_artifact(self, global_mean: f64) -> ModelArtifact {
        ModelArtifact {
            rank: self.rank,
            user_ids: self.user_ids,
            movie_ids: self.movie_ids,
            user_embeddings: self.user_factors,
            item_embeddings: self.item_factors,
            user_means: self.user_means,
            global_mean,
        }
    }
}

/// Exclusive marker next to the artifact; removed when dropped
struct TrainingLock {
    path: PathBuf,
}

impl TrainingLock {
    fn acquire(artifact_path: &Path) -> Result<Self> {
        let mut name = artifact_path.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // pid is informational, for whoever finds a stale lock
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    debug!("Failed to record pid in {:?}: {}", path, e);
                }
                debug!("Acquired training lock {:?}", path);
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(TrainError::TrainingInProgress {
                path: path.display().to_string(),
            }),
            Err(e) => Err(TrainError::Io(e)),
        }
    }
}

impl Drop for TrainingLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove training lock {:?}: {}", self.path, e);
        }
    }
}

/// Matrix-factorization trainer
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Full job: read the store, build the artifact and publish it to `artifact_path`.
    ///
    /// Holds `<artifact_path>.lock` for the whole run; a second trainer on
    /// the same path fails with [`TrainError::TrainingInProgress`].
    #[instrument(skip(self, store), fields(rank = self.config.rank))]
    pub fn train<S: RatingStore + ?Sized>(
        &self,
        store: &S,
        artifact_path: &Path,
    ) -> Result<TrainingOutcome> {
        self.config.validate()?;
        let _lock = TrainingLock::acquire(artifact_path)?;
        let start = Instant::now();

        let records = store.fetch_all()?;
        info!("Fetched {} rating records", records.len());

        let (artifact, evaluation) = self.build_artifact(records)?;
        artifact.save(artifact_path)?;

        info!("Training finished in {:?}", start.elapsed());
        Ok(TrainingOutcome {
            artifact,
            evaluation,
        })
    }

    /// Everything but the I/O: evaluate on a holdout, then fit the full set.
    pub fn build_artifact(
        &self,
        records: Vec<RatingRecord>,
    ) -> Result<(ModelArtifact, Option<EvaluationReport>)> {
        self.config.validate()?;

        // an invalid update must not hide the valid rating it would supersede
        let total = records.len();
        let valid: Vec<RatingRecord> = records.into_iter().filter(|r| r.is_valid()).collect();
        let invalid = total - valid.len();
        let before = valid.len();
        let ratings = latest_ratings(valid);
        let superseded = before - ratings.len();
        if superseded > 0 {
            debug!("Dropped {} superseded ratings", superseded);
        }
        if invalid > 0 {
            warn!("Ignoring {} ratings outside [{}, {}]", invalid, MIN_RATING, MAX_RATING);
        }
        if ratings.is_empty() {
            return Err(TrainError::InsufficientData);
        }

        let global_mean = mean_rating(&ratings);
        info!(
            "Training on {} ratings, global mean {:.4}",
            ratings.len(),
            global_mean
        );

        let evaluation = if self.config.test_ratio > 0.0 && ratings.len() >= 2 {
            Some(self.evaluate(&ratings, global_mean)?)
        } else {
            None
        };

        let model = self.fit(&ratings)?;
        Ok((model.into_artifact(global_mean), evaluation))
    }

    /// Score a model fitted on the train split against the held-out ratings
    #[instrument(skip(self, ratings, global_mean))]
    fn evaluate(&self, ratings: &[RatingRecord], global_mean: f64) -> Result<EvaluationReport> {
        let (train, test) = split_ratings(ratings, self.config.test_ratio, self.config.seed);
        let model = self.fit(&train)?;

        let mut pairs = Vec::with_capacity(test.len());
        for record in &test {
            if let Some(raw) = model.predict(record.user_id, record.movie_id) {
                pairs.push((clip_rating(raw), record.rating as f64));
            }
        }
        let evaluated = pairs.len();
        let report = EvaluationReport {
            train_size: train.len(),
            test_size: test.len(),
            evaluated,
            skipped: test.len() - evaluated,
            model: ErrorMetrics::from_pairs(pairs),
            baseline: ErrorMetrics::from_pairs(
                test.iter().map(|r| (global_mean, r.rating as f64)),
            ),
        };

        info!(
            "Holdout: {} evaluated, {} skipped, MAE {:?}",
            report.evaluated,
            report.skipped,
            report.model.map(|m| m.mae)
        );
        Ok(report)
    }

    /// Center by user mean and factor
    fn fit(&self, ratings: &[RatingRecord]) -> Result<FittedModel> {
        if ratings.is_empty() {
            return Err(TrainError::InsufficientData);
        }

        let mut user_ids: Vec<UserId> = ratings.iter().map(|r| r.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut movie_ids: Vec<MovieId> = ratings.iter().map(|r| r.movie_id).collect();
        movie_ids.sort_unstable();
        movie_ids.dedup();

        let user_index: HashMap<UserId, usize> =
            user_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let movie_index: HashMap<MovieId, usize> =
            movie_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut sums: BTreeMap<UserId, (f64, usize)> = BTreeMap::new();
        for r in ratings {
            let entry = sums.entry(r.user_id).or_insert((0.0, 0));
            entry.0 += r.rating as f64;
            entry.1 += 1;
        }
        let user_means: BTreeMap<UserId, f64> = sums
            .into_iter()
            .map(|(user_id, (sum, count))| (user_id, sum / count as f64))
            .collect();

        let triplets = ratings
            .iter()
            .map(|r| {
                (
                    user_index[&r.user_id],
                    movie_index[&r.movie_id],
                    r.rating as f64 - user_means[&r.user_id],
                )
            })
            .collect();
        let matrix = SparseMatrix::from_triplets(user_ids.len(), movie_ids.len(), triplets);

        let rank = self.config.rank.min(user_ids.len()).min(movie_ids.len());
        if rank < self.config.rank {
            warn!(
                "Clamping rank {} to {} for a {}x{} matrix",
                self.config.rank,
                rank,
                user_ids.len(),
                movie_ids.len()
            );
        }

        let svd = truncated_svd(
            &matrix,
            SvdParams {
                rank,
                power_iterations: self.config.power_iterations,
                oversampling: self.config.oversampling,
                seed: self.config.seed,
            },
        )?;

        if svd.user_factors.iter().chain(svd.item_factors.iter()).any(|v| !v.is_finite()) {
            return Err(TrainError::Numeric(format!(
                "non-finite factors for a {}x{} matrix at rank {}",
                user_ids.len(),
                movie_ids.len(),
                rank
            )));
        }

        Ok(FittedModel {
            rank,
            user_ids,
            movie_ids,
            user_index,
            movie_index,
            user_factors: svd.user_factors,
            item_factors: svd.item_factors,
            user_means,
        })
    }
}

fn mean_rating(ratings: &[RatingRecord]) -> f64 {
    ratings.iter().map(|r| r.rating as f64).sum::<f64>() / ratings.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<RatingRecord> {
        let mut out = Vec::new();
        for user in 1..=6u32 {
            for movie in 1..=8u32 {
                if (user + movie) % 3 != 0 {
                    let rating = 0.5 + ((user * 7 + movie * 3) % 10) as f32 * 0.5;
                    out.push(RatingRecord::new(user, movie, rating, (user * 100 + movie) as i64));
                }
            }
        }
        out
    }

    #[test]
    fn test_clip_rating() {
        assert_eq!(clip_rating(7.2), 5.0);
        assert_eq!(clip_rating(-1.0), 0.5);
        assert_eq!(clip_rating(3.25), 3.25);
    }

    #[test]
    fn test_fit_centers_by_user_mean() {
        let trainer = Trainer::new(TrainerConfig::default().with_rank(2));
        let ratings = latest_ratings(grid());
        let model = trainer.fit(&ratings).unwrap();

        assert_eq!(model.rank, 2);
        let user_one: Vec<f64> = ratings
            .iter()
            .filter(|r| r.user_id == 1)
            .map(|r| r.rating as f64)
            .collect();
        let expected = user_one.iter().sum::<f64>() / user_one.len() as f64;
        assert!((model.user_means[&1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rank_is_clamped() {
        let trainer = Trainer::new(TrainerConfig::default());
        let ratings = vec![
            RatingRecord::new(1, 10, 4.0, 1),
            RatingRecord::new(2, 10, 3.0, 1),
            RatingRecord::new(2, 20, 5.0, 1),
        ];
        let model = trainer.fit(&ratings).unwrap();
        assert_eq!(model.rank, 2);
        assert_eq!(model.user_factors.dim(), (2, 2));
        assert_eq!(model.item_factors.dim(), (2, 2));
    }

    #[test]
    fn test_full_rank_fit_reproduces_observed_ratings() {
        let trainer = Trainer::new(TrainerConfig::default().with_rank(3));
        let ratings = vec![
            RatingRecord::new(1, 1, 5.0, 1),
            RatingRecord::new(1, 2, 3.0, 1),
            RatingRecord::new(2, 2, 4.0, 1),
            RatingRecord::new(2, 3, 1.0, 1),
            RatingRecord::new(3, 1, 2.0, 1),
            RatingRecord::new(3, 3, 4.5, 1),
        ];
        let model = trainer.fit(&ratings).unwrap();
        for r in &ratings {
            let predicted = model.predict(r.user_id, r.movie_id).unwrap();
            assert!((predicted - r.rating as f64).abs() < 1e-6);
        }
        assert!(model.predict(9, 1).is_none());
    }

    #[test]
    fn test_evaluation_counts_add_up() {
        let trainer = Trainer::new(TrainerConfig::default().with_rank(3));
        let (_, report) = trainer.build_artifact(grid()).unwrap();
        let report = report.unwrap();
        assert_eq!(report.train_size + report.test_size, grid().len());
        assert_eq!(report.evaluated + report.skipped, report.test_size);
        assert!(report.baseline.is_some());
    }

    #[test]
    fn test_zero_test_ratio_skips_evaluation() {
        let trainer = Trainer::new(TrainerConfig::default().with_test_ratio(0.0));
        let (artifact, report) = trainer.build_artifact(grid()).unwrap();
        assert!(report.is_none());
        assert_eq!(artifact.user_ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_invalid_ratings_are_ignored() {
        let trainer = Trainer::new(TrainerConfig::default().with_test_ratio(0.0));
        let records = vec![
            RatingRecord::new(1, 1, 4.0, 1),
            RatingRecord::new(2, 1, f32::NAN, 1),
            RatingRecord::new(3, 1, 9.0, 1),
        ];
        let (artifact, _) = trainer.build_artifact(records).unwrap();
        assert_eq!(artifact.user_ids, vec![1]);
        assert_eq!(artifact.global_mean, 4.0);
    }

    #[test]
    fn test_invalid_update_keeps_valid_rating() {
        let trainer = Trainer::new(TrainerConfig::default().with_rank(1).with_test_ratio(0.0));
        let records = vec![
            RatingRecord::new(1, 10, 4.0, 100),
            RatingRecord::new(1, 10, f32::NAN, 200),
            RatingRecord::new(1, 10, 7.5, 300),
            RatingRecord::new(2, 10, 3.0, 100),
        ];
        let (artifact, _) = trainer.build_artifact(records).unwrap();
        assert_eq!(artifact.user_ids, vec![1, 2]);
        assert_eq!(artifact.user_means[&1], 4.0);
        assert_eq!(artifact.global_mean, 3.5);
    }

    #[test]
    fn test_empty_input() {
        let trainer = Trainer::default();
        assert!(matches!(
            trainer.build_artifact(Vec::new()),
            Err(TrainError::InsufficientData)
        ));
    }
}
