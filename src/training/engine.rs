//! Training pipeline driver
//!
//! raw table → schema + dataset → stratified folds → hyperparameter search →
//! refit of the best configuration on every record → persisted artifacts.

use super::config::TrainingConfig;
use super::cross_validation::{CrossValidationSplitter, FoldAssignment};
use super::evaluator::ModelEvaluator;
use super::model::TrainedModel;
use crate::error::{PerfError, Result};
use crate::optimizer::{HyperparameterConfig, HyperparameterSearchEngine, OptimizationConfig, Study};
use crate::preprocessing::{FeatureSchemaReconciler, ReconcileConfig, RejectedRecord, Schema};
use crate::utils::fs::{commit_all, stage_json};
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Everything a training run produces
#[derive(Debug)]
pub struct TrainingOutcome {
    pub schema: Schema,
    pub model: TrainedModel,
    pub study: Study,
    pub folds: FoldAssignment,
    /// Raw rows excluded from training
    pub rejected: Vec<RejectedRecord>,
}

impl TrainingOutcome {
    pub fn best_params(&self) -> &HyperparameterConfig {
        self.model.hyperparameters()
    }

    pub fn cv_score(&self) -> f64 {
        self.model.cv_score()
    }
}

/// Main training engine
#[derive(Debug, Clone, Default)]
pub struct TrainEngine {
    reconcile: ReconcileConfig,
    training: TrainingConfig,
    optimization: OptimizationConfig,
}

impl TrainEngine {
    pub fn new(
        reconcile: ReconcileConfig,
        training: TrainingConfig,
        optimization: OptimizationConfig,
    ) -> Self {
        Self {
            reconcile,
            training,
            optimization,
        }
    }

    pub fn training_config(&self) -> &TrainingConfig {
        &self.training
    }

    /// Train in memory. `previous` turns the run into a schema extension.
    pub fn train(&self, df: &DataFrame, previous: Option<&Schema>) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let table = FeatureSchemaReconciler::new(self.reconcile.clone()).fit(df, previous)?;
        let (schema, dataset) = (table.schema, table.dataset);

        if dataset.is_empty() {
            return Err(PerfError::InsufficientData(
                "no valid training records after reconciliation".to_string(),
            ));
        }
        info!(
            n_records = dataset.len(),
            n_positive = dataset.positive_count(),
            n_features = dataset.n_features(),
            "Training data ready"
        );

        let folds = CrossValidationSplitter::new(self.training.n_folds)
            .with_seed(self.training.seed)
            .split(&dataset)?;
        let evaluator = ModelEvaluator::new(self.training.seed, &self.training.parallel())?;
        info!(
            n_folds = folds.k(),
            workers = evaluator.n_workers(),
            n_trials = self.optimization.n_trials,
            "Starting hyperparameter search"
        );

        let study = HyperparameterSearchEngine::new(self.optimization.clone()).search(
            &self.training.search_space,
            self.optimization.n_trials,
            |trial_id, params| evaluator.evaluate(trial_id, params, &dataset, &folds),
        )?;

        let best = study.best_trial().ok_or_else(|| PerfError::TrialFailure {
            trial: 0,
            reason: "search produced no successful trial".to_string(),
        })?;
        let cv_score = best.score().unwrap_or(f64::NAN);
        let params = best.params.clone();
        info!(trial = best.trial_id, cv_score, %params, "Best configuration selected");

        let ensemble = evaluator.fit_full(&params, &dataset)?;
        let model = TrainedModel::new(&schema, params, cv_score, ensemble)?;

        info!(
            version = %schema.version_tag(),
            cv_score,
            secs = start.elapsed().as_secs_f64(),
            "Training finished"
        );

        Ok(TrainingOutcome {
            schema,
            model,
            study,
            folds,
            rejected: table.rejected,
        })
    }

    /// Train and persist the schema and model as a pair.
    ///
    /// Both files are fully written before either target is replaced; if the
    /// pair cannot be committed the previous artifacts stay in place.
    pub fn run(
        &self,
        df: &DataFrame,
        previous: Option<&Schema>,
        schema_path: &Path,
        model_path: &Path,
    ) -> Result<TrainingOutcome> {
        let outcome = self.train(df, previous)?;
        let staged = vec![
            stage_json(schema_path, &outcome.schema)?,
            stage_json(model_path, &outcome.model)?,
        ];
        commit_all(staged)?;
        info!(
            schema = %schema_path.display(),
            model = %model_path.display(),
            version = %outcome.schema.version_tag(),
            "Artifacts saved"
        );
        Ok(outcome)
    }
}
