//! Model training module
//!
//! Stratified cross-validation, the boosted tree ensemble, per-trial
//! evaluation and the persisted model artifact, tied together by
//! [`TrainEngine`].

mod config;
mod engine;
mod ensemble;
mod evaluator;
mod metrics;
mod model;
pub mod cross_validation;

pub use config::TrainingConfig;
pub use cross_validation::{CVResults, CVSplit, CrossValidationSplitter, FoldAssignment};
pub use engine::{TrainEngine, TrainingOutcome};
pub use ensemble::{BoostedEnsemble, EnsembleConfig};
pub use evaluator::{FoldMetrics, ModelEvaluator, TrialEvaluation};
pub use metrics::{micro_f1, ClassificationMetrics, ConfusionCounts};
pub use model::{TrainedModel, MODEL_FORMAT_VERSION};
