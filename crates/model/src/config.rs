//! Trainer configuration.

use crate::error::{Result, TrainError};

/// Knobs for a training run.
///
/// Defaults: rank 20, 20% holdout, seed 42, 5 power iterations,
/// 10 oversampling columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    /// Embedding dimensionality `k`
    pub rank: usize,
    /// Fraction of ratings held out for evaluation, in `[0, 1)`
    pub test_ratio: f64,
    /// Seed for the holdout split and the randomized SVD
    pub seed: u64,
    /// Power iterations in the randomized range finder
    pub power_iterations: usize,
    /// Extra sketch columns beyond `rank`
    pub oversampling: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            rank: 20,
            test_ratio: 0.2,
            seed: 42,
            power_iterations: 5,
            oversampling: 10,
        }
    }
}

impl TrainerConfig {
    /// Configure embedding rank (default: 20)
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Configure holdout fraction (default: 0.2). Zero disables evaluation.
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Configure the random seed (default: 42)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Configure power iterations (default: 5)
    pub fn with_power_iterations(mut self, iterations: usize) -> Self {
        self.power_iterations = iterations;
        self
    }

    /// Configure oversampling (default: 10)
    pub fn with_oversampling(mut self, oversampling: usize) -> Self {
        self.oversampling = oversampling;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(TrainError::InvalidConfig("rank must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.test_ratio) {
            return Err(TrainError::InvalidConfig(format!(
                "test_ratio must be in [0, 1), got {}",
                self.test_ratio
            )));
        }
        Ok(())
    }
}
