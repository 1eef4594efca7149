//! Cross-validated evaluation of one hyperparameter configuration

use super::cross_validation::{CVResults, CVSplit, FoldAssignment};
use super::ensemble::{BoostedEnsemble, EnsembleConfig};
use super::metrics::ClassificationMetrics;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::optimizer::HyperparameterConfig;
use crate::utils::{parallel_map, ParallelConfig};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Metrics of one fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold_idx: usize,
    /// Diagnostic only
    pub train: ClassificationMetrics,
    pub validation: ClassificationMetrics,
    pub duration_secs: f64,
}

/// All folds of one trial, ordered by fold id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialEvaluation {
    pub trial_id: usize,
    pub folds: Vec<FoldMetrics>,
    /// Validation micro-F1 across folds
    pub cv: CVResults,
}

impl TrialEvaluation {
    pub fn new(trial_id: usize, mut folds: Vec<FoldMetrics>) -> Self {
        folds.sort_by_key(|f| f.fold_idx);
        let cv = CVResults::from_scores(folds.iter().map(|f| f.validation.micro_f1).collect());
        Self { trial_id, folds, cv }
    }

    /// Mean validation micro-F1
    pub fn score(&self) -> f64 {
        self.cv.mean_score
    }

    /// Mean training micro-F1
    pub fn train_score(&self) -> f64 {
        if self.folds.is_empty() {
            return f64::NAN;
        }
        self.folds.iter().map(|f| f.train.micro_f1).sum::<f64>() / self.folds.len() as f64
    }
}

/// A fold job, keyed by `(trial_id, fold_id)`
struct FoldJob {
    trial_id: usize,
    split: CVSplit,
}

/// Fits and scores the ensemble on every fold of an assignment
pub struct ModelEvaluator {
    seed: u64,
    pool: rayon::ThreadPool,
}

impl ModelEvaluator {
    pub fn new(seed: u64, parallel: &ParallelConfig) -> Result<Self> {
        Ok(Self {
            seed,
            pool: parallel.build_pool()?,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate `params` on every fold. Any fold error fails the trial.
    pub fn evaluate(
        &self,
        trial_id: usize,
        params: &HyperparameterConfig,
        dataset: &Dataset,
        folds: &FoldAssignment,
    ) -> Result<TrialEvaluation> {
        let config = EnsembleConfig::from_hyperparameters(params, self.seed)?;
        let jobs: Vec<FoldJob> = folds
            .splits(dataset)?
            .into_iter()
            .map(|split| FoldJob { trial_id, split })
            .collect();

        let results = parallel_map(&self.pool, jobs, |job| run_fold(&job, &config, dataset));
        let metrics = results.into_iter().collect::<Result<Vec<_>>>()?;

        Ok(TrialEvaluation::new(trial_id, metrics))
    }

    /// Fit one ensemble on every record of `dataset`
    pub fn fit_full(&self, params: &HyperparameterConfig, dataset: &Dataset) -> Result<BoostedEnsemble> {
        let config = EnsembleConfig::from_hyperparameters(params, self.seed)?;
        let (x, y) = dataset.full_matrix()?;
        let mut model = BoostedEnsemble::new(config);
        self.pool.install(|| model.fit(&x, &y))?;
        Ok(model)
    }
}

fn run_fold(job: &FoldJob, config: &EnsembleConfig, dataset: &Dataset) -> Result<FoldMetrics> {
    let start = Instant::now();
    let split = &job.split;

    let (x_train, y_train) = dataset.design_matrix(&split.train_indices)?;
    let (x_valid, y_valid) = dataset.design_matrix(&split.test_indices)?;

    let mut model = BoostedEnsemble::new(config.clone());
    model.fit(&x_train, &y_train)?;

    let train_pred = model.predict(&x_train)?;
    let valid_pred = model.predict(&x_valid)?;

    let metrics = FoldMetrics {
        fold_idx: split.fold_idx,
        train: ClassificationMetrics::compute(&y_train.to_vec(), &train_pred.to_vec()),
        validation: ClassificationMetrics::compute(&y_valid.to_vec(), &valid_pred.to_vec()),
        duration_secs: start.elapsed().as_secs_f64(),
    };

    debug!(
        trial = job.trial_id,
        fold = split.fold_idx,
        train_f1 = metrics.train.micro_f1,
        valid_f1 = metrics.validation.micro_f1,
        secs = metrics.duration_secs,
        "Fold evaluated"
    );
    Ok(metrics)
}
