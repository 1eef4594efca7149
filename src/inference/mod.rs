//! Inference engine module
//!
//! Scores new candidates with a persisted model:
//! - schema-bound loading (a model only runs under the schema it was trained with)
//! - reconciliation of arbitrary raw tables onto the schema
//! - chunked parallel scoring via rayon for large batches
//! - atomic CSV output of prediction records

mod config;
mod engine;

pub use config::InferenceConfig;
pub use engine::{InferenceEngine, InferenceStats, PredictionBatch, PredictionRecord};
