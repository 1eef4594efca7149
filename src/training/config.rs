//! Training configuration

use crate::optimizer::SearchSpace;
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of stratified cross-validation folds
    pub n_folds: usize,

    /// Seed for fold assignment and every ensemble fit
    pub seed: u64,

    /// Fold worker threads (None = all cores)
    pub n_jobs: Option<usize>,

    /// Hyperparameters searched per trial
    pub search_space: SearchSpace,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            seed: 42,
            n_jobs: None,
            search_space: SearchSpace::boosting(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_folds(mut self, n: usize) -> Self {
        self.n_folds = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    pub fn with_search_space(mut self, space: SearchSpace) -> Self {
        self.search_space = space;
        self
    }

    pub fn parallel(&self) -> ParallelConfig {
        ParallelConfig { n_threads: self.n_jobs }
    }
}
