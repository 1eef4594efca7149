//! Fixed-budget hyperparameter search

use super::config::OptimizationConfig;
use super::samplers::create_sampler;
use super::search_space::{HyperparameterConfig, SearchSpace};
use crate::error::{PerfError, Result};
use crate::training::TrialEvaluation;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub params: HyperparameterConfig,
    /// Per-fold metrics, absent for failed trials
    pub evaluation: Option<TrialEvaluation>,
    /// Objective value (negated cross-validated score), `+inf` when failed
    pub value: f64,
    pub duration_secs: f64,
    pub failed: bool,
    pub failure: Option<String>,
}

impl TrialResult {
    /// Mean validation score, absent for failed trials
    pub fn score(&self) -> Option<f64> {
        self.evaluation.as_ref().map(TrialEvaluation::score)
    }
}

/// Study containing all trials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    pub best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
}

impl Study {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&HyperparameterConfig> {
        self.best_trial().map(|t| &t.params)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_trial().and_then(TrialResult::score)
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.failed).count()
    }

    /// Record a trial; a failed trial never becomes the best
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = !result.failed
            && match self.best_value() {
                None => true,
                Some(best) => result.value < best,
            };

        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }
}

/// Sequential search over a [`SearchSpace`]
pub struct HyperparameterSearchEngine {
    config: OptimizationConfig,
}

impl HyperparameterSearchEngine {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Run exactly `n_trials` trials and return the study.
    ///
    /// A trial whose objective errors or yields a non-finite score is kept in
    /// the sampler history with value `+inf` and the search moves on. The
    /// search itself fails only when no trial succeeds.
    pub fn search<F>(&self, space: &SearchSpace, n_trials: usize, mut objective: F) -> Result<Study>
    where
        F: FnMut(usize, &HyperparameterConfig) -> Result<TrialEvaluation>,
    {
        if n_trials == 0 {
            return Err(PerfError::invalid_parameter("n_trials", 0, "at least one trial is required"));
        }
        space.validate()?;

        let start = Instant::now();
        let mut sampler = create_sampler(&self.config);
        let mut history: Vec<(HyperparameterConfig, f64)> = Vec::with_capacity(n_trials);
        let mut study = Study::new();

        for trial_id in 0..n_trials {
            let params = sampler.sample(space, &history);
            let trial_start = Instant::now();

            let outcome = match objective(trial_id, &params) {
                Ok(eval) if eval.score().is_finite() => Ok(eval),
                Ok(eval) => Err(format!("non-finite cross-validated score {}", eval.score())),
                Err(e) => Err(e.to_string()),
            };

            let result = match outcome {
                Ok(eval) => TrialResult {
                    trial_id,
                    params: params.clone(),
                    value: -eval.score(),
                    evaluation: Some(eval),
                    duration_secs: trial_start.elapsed().as_secs_f64(),
                    failed: false,
                    failure: None,
                },
                Err(reason) => {
                    warn!(trial = trial_id, %params, %reason, "Trial failed");
                    TrialResult {
                        trial_id,
                        params: params.clone(),
                        evaluation: None,
                        value: f64::INFINITY,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                        failed: true,
                        failure: Some(reason),
                    }
                }
            };

            history.push((params, result.value));
            let (value, secs) = (result.value, result.duration_secs);
            study.add_trial(result);

            info!(
                trial = trial_id,
                objective = value,
                best = study.best_value().unwrap_or(f64::INFINITY),
                secs,
                "Trial complete"
            );
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();

        if study.best_trial().is_none() {
            let last = study
                .trials
                .last()
                .and_then(|t| t.failure.clone())
                .unwrap_or_default();
            return Err(PerfError::TrialFailure {
                trial: n_trials - 1,
                reason: format!("all {} trials failed, last error: {}", n_trials, last),
            });
        }

        info!(
            n_trials,
            n_failed = study.n_failed(),
            best_score = study.best_score().unwrap_or(f64::NAN),
            secs = study.total_duration_secs,
            "Search finished"
        );
        Ok(study)
    }
}
