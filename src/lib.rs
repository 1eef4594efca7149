//! perfscore - candidate performance scoring
//!
//! Predicts a binary performance outcome from a flat table of candidate
//! features. Training derives a versioned feature schema, assigns stratified
//! folds, tunes a gradient-boosted tree ensemble with a TPE search and persists
//! the (schema, model) pair. Inference reconciles new tables onto that schema
//! and scores them.
//!
//! # Modules
//!
//! - [`preprocessing`] - Schema derivation and reconciliation of raw tables
//! - [`training`] - Stratified folds, boosted ensemble, evaluation, model artifact
//! - [`optimizer`] - Search spaces, samplers and the trial loop
//! - [`inference`] - Schema-bound scoring of new candidates
//! - [`cli`] - Command-line interface

pub mod error;
pub mod dataset;

pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod inference;

pub mod utils;
pub mod cli;

pub use error::{PerfError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PerfError, Result};

    pub use crate::dataset::{CandidateId, Dataset, FeatureVector, Record};

    pub use crate::preprocessing::{FeatureSchemaReconciler, ReconcileConfig, Schema};

    pub use crate::training::{
        CrossValidationSplitter, FoldAssignment, ModelEvaluator, TrainEngine, TrainedModel,
        TrainingConfig,
    };

    pub use crate::optimizer::{HyperparameterSearchEngine, OptimizationConfig, SearchSpace};

    pub use crate::inference::{InferenceConfig, InferenceEngine, PredictionRecord};

    pub use crate::cli::PipelineConfig;
}
