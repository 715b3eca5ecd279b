//! Holdout evaluation: split and error metrics.

use data_loader::RatingRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

/// Mean absolute and root-mean-square error over a set of predictions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
}

impl ErrorMetrics {
    /// Metrics over (predicted, actual) pairs; `None` when there are none
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let (mut abs_sum, mut sq_sum, mut count) = (0.0, 0.0, 0usize);
        for (predicted, actual) in pairs {
            let err = predicted - actual;
            abs_sum += err.abs();
            sq_sum += err * err;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            mae: abs_sum / count as f64,
            rmse: (sq_sum / count as f64).sqrt(),
        })
    }
}

/// Diagnostic output of a training run. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub train_size: usize,
    pub test_size: usize,
    /// Test pairs whose user and movie were both in the train matrix
    pub evaluated: usize,
    /// Test pairs skipped because the user or movie was unseen in training
    pub skipped: usize,
    /// Factorization error on the evaluated pairs
    pub model: Option<ErrorMetrics>,
    /// Error of always predicting the global mean, over the whole test subset
    pub baseline: Option<ErrorMetrics>,
}

impl EvaluationReport {
    /// Baseline MAE minus model MAE; positive means the model helps
    pub fn mae_improvement(&self) -> Option<f64> {
        Some(self.baseline?.mae - self.model?.mae)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "train={} test={} evaluated={} skipped={}",
            self.train_size, self.test_size, self.evaluated, self.skipped
        )?;
        if let Some(b) = self.baseline {
            writeln!(f, "baseline (global mean): MAE {:.4}  RMSE {:.4}", b.mae, b.rmse)?;
        }
        match self.model {
            Some(m) => write!(f, "factorization:          MAE {:.4}  RMSE {:.4}", m.mae, m.rmse),
            None => write!(f, "factorization:          no overlapping test pairs"),
        }
    }
}

/// Deterministic train/test split.
///
/// Shuffles with a seeded RNG and holds out `ceil(len * test_ratio)` records,
/// capped so at least one record stays in train. The input order matters,
/// so callers pass ratings in a canonical order.
pub fn split_ratings(
    ratings: &[RatingRecord],
    test_ratio: f64,
    seed: u64,
) -> (Vec<RatingRecord>, Vec<RatingRecord>) {
    if ratings.is_empty() {
        return (Vec::new(), Vec::new());
    }
    // the epsilon keeps e.g. 30 * 0.1 = 3.0000000000000004 from rounding up to 4
    let exact = ratings.len() as f64 * test_ratio;
    let test_len = ((exact - 1e-9).ceil().max(0.0) as usize).min(ratings.len() - 1);

    let mut shuffled = ratings.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let train = shuffled.split_off(test_len);
    (train, shuffled)
}
