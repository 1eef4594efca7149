//! Pipeline configuration file

use crate::error::{PerfError, Result};
use crate::inference::InferenceConfig;
use crate::optimizer::OptimizationConfig;
use crate::preprocessing::ReconcileConfig;
use crate::training::TrainingConfig;
use crate::utils::fs::read_json;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every stage's configuration in one JSON document; absent sections take defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub reconcile: ReconcileConfig,
    pub training: TrainingConfig,
    pub optimization: OptimizationConfig,
    pub inference: InferenceConfig,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub folds: Option<usize>,
    pub trials: Option<usize>,
    pub seed: Option<u64>,
    pub jobs: Option<usize>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path).map_err(|e| {
            PerfError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })
    }

    /// Defaults when no file is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(folds) = overrides.folds {
            self.training.n_folds = folds;
        }
        if let Some(trials) = overrides.trials {
            self.optimization.n_trials = trials;
        }
        if let Some(seed) = overrides.seed {
            self.training.seed = seed;
            self.optimization.seed = seed;
        }
        if overrides.jobs.is_some() {
            self.training.n_jobs = overrides.jobs;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.training.n_folds < 2 {
            return Err(PerfError::invalid_parameter(
                "n_folds",
                self.training.n_folds,
                "at least 2 folds are required",
            ));
        }
        if self.optimization.n_trials == 0 {
            return Err(PerfError::invalid_parameter("n_trials", 0, "at least one trial is required"));
        }
        if self.training.n_jobs == Some(0) {
            return Err(PerfError::invalid_parameter("n_jobs", 0, "must be positive"));
        }
        self.training.search_space.validate()
    }
}
