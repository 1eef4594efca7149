//! Inference engine implementation
//!
//! Scores raw tables under a persisted (schema, model) pair. Large batches are
//! split into chunks scored in parallel via rayon; output order always matches
//! input order.

use super::InferenceConfig;
use crate::dataset::{CandidateId, FeatureVector};
use crate::error::{PerfError, Result};
use crate::preprocessing::{
    FeatureSchemaReconciler, ReconcileConfig, ReconciledBatch, RejectedRecord, Schema,
};
use crate::training::TrainedModel;
use crate::utils::data_loader::save_csv;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Scored candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub candidate_id: CandidateId,
    pub class_0_probability: f64,
    pub class_1_probability: f64,
    /// 1 iff class 1 is strictly more likely
    pub decision: u8,
}

impl PredictionRecord {
    pub fn from_probability(candidate_id: CandidateId, p1: f64) -> Self {
        let p0 = 1.0 - p1;
        Self {
            candidate_id,
            class_0_probability: p0,
            class_1_probability: p1,
            decision: u8::from(p1 > p0),
        }
    }
}

/// Predictions for a raw table plus what reconciliation had to do to get there
#[derive(Debug)]
pub struct PredictionBatch {
    pub predictions: Vec<PredictionRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub filled_features: Vec<String>,
    pub dropped_columns: Vec<String>,
}

impl PredictionBatch {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn n_positive(&self) -> usize {
        self.predictions.iter().filter(|p| p.decision == 1).count()
    }

    /// Predictions as a frame: id, class probabilities, decision
    pub fn to_dataframe(&self, id_column: &str) -> Result<DataFrame> {
        let ids: Vec<&str> = self.predictions.iter().map(|p| p.candidate_id.as_str()).collect();
        let p0: Vec<f64> = self.predictions.iter().map(|p| p.class_0_probability).collect();
        let p1: Vec<f64> = self.predictions.iter().map(|p| p.class_1_probability).collect();
        let decision: Vec<i32> = self.predictions.iter().map(|p| i32::from(p.decision)).collect();

        Ok(DataFrame::new(vec![
            Column::new(id_column.into(), ids),
            Column::new("class_0_probability".into(), p0),
            Column::new("class_1_probability".into(), p1),
            Column::new("decision".into(), decision),
        ])?)
    }

    /// Write predictions as CSV, atomically
    pub fn write_csv(&self, path: impl AsRef<Path>, id_column: &str) -> Result<()> {
        let path = path.as_ref();
        let mut df = self.to_dataframe(id_column)?;
        save_csv(&mut df, path)?;
        info!(path = %path.display(), n_predictions = self.len(), "Predictions written");
        Ok(())
    }
}

/// Inference statistics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub total_rejected: u64,
    pub n_batches: u64,
    pub avg_batch_latency_ms: f64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    predictions: AtomicU64,
    rejected: AtomicU64,
    batches: AtomicU64,
    latency_us: AtomicU64,
}

/// Scores raw tables against a schema-bound model
#[derive(Debug)]
pub struct InferenceEngine {
    config: InferenceConfig,
    reconciler: FeatureSchemaReconciler,
    schema: Schema,
    model: TrainedModel,
    counters: StatsCounters,
}

impl InferenceEngine {
    /// Pair a schema with a model; the model must have been trained under it
    pub fn new(
        config: InferenceConfig,
        reconcile: ReconcileConfig,
        schema: Schema,
        model: TrainedModel,
    ) -> Result<Self> {
        model.ensure_schema(&schema)?;
        Ok(Self {
            config,
            reconciler: FeatureSchemaReconciler::new(reconcile),
            schema,
            model,
            counters: StatsCounters::default(),
        })
    }

    /// Load from files
    pub fn load(
        config: InferenceConfig,
        reconcile: ReconcileConfig,
        schema_path: &Path,
        model_path: &Path,
    ) -> Result<Self> {
        let schema = Schema::load(schema_path)?;
        let model = TrainedModel::load(model_path)?;
        info!(
            schema = %schema.version_tag(),
            n_features = schema.len(),
            cv_score = model.cv_score(),
            "Artifacts loaded"
        );
        Self::new(config, reconcile, schema, model)
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Score a reconciled batch with `model`, preserving input order.
    ///
    /// The batch must have been aligned under the schema the model was trained
    /// on; otherwise the call fails with `ArtifactVersionMismatch`. Any vector
    /// whose width differs from the model fails with `SchemaMismatch`.
    pub fn predict(model: &TrainedModel, batch: &ReconciledBatch) -> Result<Vec<PredictionRecord>> {
        model.ensure_aligned_under(batch.schema_revision, &batch.schema_fingerprint)?;
        score_all(model, &batch.vectors)
    }

    /// Reconcile `df` under the loaded schema and score every aligned record
    pub fn predict_table(&self, df: &DataFrame) -> Result<PredictionBatch> {
        let start = Instant::now();
        let batch = self.reconciler.reconcile(df, &self.schema)?;
        if !batch.filled_features.is_empty() {
            debug!(
                n_filled = batch.filled_features.len(),
                features = ?batch.filled_features,
                "Schema features missing from input were zero-filled"
            );
        }

        // The engine's schema is checked against the model at construction
        let predictions = self.score_vectors(&batch.vectors)?;
        self.record(predictions.len(), batch.rejected.len(), start);

        info!(
            n_predictions = predictions.len(),
            n_rejected = batch.rejected.len(),
            ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch scored"
        );

        Ok(PredictionBatch {
            predictions,
            rejected: batch.rejected,
            filled_features: batch.filled_features,
            dropped_columns: batch.dropped_columns,
        })
    }

    /// Statistics since construction
    pub fn stats(&self) -> InferenceStats {
        let n_batches = self.counters.batches.load(Ordering::Relaxed);
        let latency_us = self.counters.latency_us.load(Ordering::Relaxed);
        InferenceStats {
            total_predictions: self.counters.predictions.load(Ordering::Relaxed),
            total_rejected: self.counters.rejected.load(Ordering::Relaxed),
            n_batches,
            avg_batch_latency_ms: if n_batches == 0 {
                0.0
            } else {
                latency_us as f64 / n_batches as f64 / 1000.0
            },
        }
    }

    fn score_vectors(&self, vectors: &[FeatureVector]) -> Result<Vec<PredictionRecord>> {
        if vectors.len() < self.config.parallel_threshold {
            return score_all(&self.model, vectors);
        }
        let chunks: Vec<Result<Vec<PredictionRecord>>> = vectors
            .par_chunks(self.config.batch_size.max(1))
            .map(|chunk| score_all(&self.model, chunk))
            .collect();

        let mut predictions = Vec::with_capacity(vectors.len());
        for chunk in chunks {
            predictions.extend(chunk?);
        }
        Ok(predictions)
    }

    fn record(&self, n_predictions: usize, n_rejected: usize, start: Instant) {
        let c = &self.counters;
        c.predictions.fetch_add(n_predictions as u64, Ordering::Relaxed);
        c.rejected.fetch_add(n_rejected as u64, Ordering::Relaxed);
        c.batches.fetch_add(1, Ordering::Relaxed);
        c.latency_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
    }
}

fn score_all(model: &TrainedModel, vectors: &[FeatureVector]) -> Result<Vec<PredictionRecord>> {
    vectors.iter().map(|v| score_one(model, v)).collect()
}

fn score_one(model: &TrainedModel, vector: &FeatureVector) -> Result<PredictionRecord> {
    if vector.len() != model.n_features() {
        return Err(PerfError::SchemaMismatch(format!(
            "candidate {}: vector has {} features, model expects {}",
            vector.candidate_id(),
            vector.len(),
            model.n_features()
        )));
    }
    let p1 = model.predict_proba_one(vector.values())?;
    Ok(PredictionRecord::from_probability(vector.candidate_id().clone(), p1))
}
