//! Persisted model artifact

use super::ensemble::BoostedEnsemble;
use crate::error::{PerfError, Result};
use crate::optimizer::HyperparameterConfig;
use crate::preprocessing::Schema;
use crate::utils::fs::write_json_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Artifact layout version understood by this build
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Final ensemble bound to the schema revision it was trained under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    format_version: u32,
    schema_revision: u32,
    schema_fingerprint: String,
    hyperparameters: HyperparameterConfig,
    cv_score: f64,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
    trained_at: DateTime<Utc>,
    ensemble: BoostedEnsemble,
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
}

impl TrainedModel {
    pub fn new(
        schema: &Schema,
        hyperparameters: HyperparameterConfig,
        cv_score: f64,
        ensemble: BoostedEnsemble,
    ) -> Result<Self> {
        if ensemble.n_features() != schema.len() {
            return Err(PerfError::SchemaMismatch(format!(
                "ensemble has {} features, schema {} has {}",
                ensemble.n_features(),
                schema.version_tag(),
                schema.len()
            )));
        }
        let feature_importances = ensemble.feature_importances()?.to_vec();

        Ok(Self {
            format_version: MODEL_FORMAT_VERSION,
            schema_revision: schema.revision(),
            schema_fingerprint: schema.fingerprint().to_string(),
            hyperparameters,
            cv_score,
            feature_names: schema.feature_names(),
            feature_importances,
            trained_at: Utc::now(),
            ensemble,
        })
    }

    pub fn schema_revision(&self) -> u32 {
        self.schema_revision
    }

    pub fn schema_fingerprint(&self) -> &str {
        &self.schema_fingerprint
    }

    pub fn hyperparameters(&self) -> &HyperparameterConfig {
        &self.hyperparameters
    }

    /// Mean validation micro-F1 of the winning configuration
    pub fn cv_score(&self) -> f64 {
        self.cv_score
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn ensemble(&self) -> &BoostedEnsemble {
        &self.ensemble
    }

    /// Features ordered by importance, highest first
    pub fn top_features(&self, n: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(self.feature_importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// Positive-class probability of one aligned feature vector
    pub fn predict_proba_one(&self, values: &[f64]) -> Result<f64> {
        if values.len() != self.n_features() {
            return Err(PerfError::SchemaMismatch(format!(
                "vector has {} features, model expects {}",
                values.len(),
                self.n_features()
            )));
        }
        self.ensemble.predict_proba_one(values)
    }

    /// Fail unless this model was trained under `schema`
    pub fn ensure_schema(&self, schema: &Schema) -> Result<()> {
        schema.ensure_compatible(self.schema_revision, &self.schema_fingerprint)
    }

    /// Fail unless vectors aligned under (`revision`, `fingerprint`) belong to this model
    pub fn ensure_aligned_under(&self, revision: u32, fingerprint: &str) -> Result<()> {
        if self.schema_revision != revision || self.schema_fingerprint != fingerprint {
            return Err(PerfError::ArtifactVersionMismatch {
                expected: short_tag(self.schema_revision, &self.schema_fingerprint),
                found: short_tag(revision, fingerprint),
            });
        }
        Ok(())
    }

    /// Persist atomically as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_json_atomic(path, self)?;
        tracing::info!(
            path = %path.display(),
            schema_revision = self.schema_revision,
            cv_score = self.cv_score,
            "Model saved"
        );
        Ok(())
    }

    /// Load a model artifact; unknown format versions are rejected
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let header: ArtifactHeader = serde_json::from_str(&json)?;
        if header.format_version != MODEL_FORMAT_VERSION {
            return Err(PerfError::ArtifactVersionMismatch {
                expected: format!("model format {}", MODEL_FORMAT_VERSION),
                found: format!("model format {}", header.format_version),
            });
        }
        Ok(serde_json::from_str(&json)?)
    }
}

fn short_tag(revision: u32, fingerprint: &str) -> String {
    format!("r{}:{}", revision, &fingerprint[..12.min(fingerprint.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{FeatureOrigin, FeatureRegistry, FeatureSpec, FeatureType};
    use crate::training::EnsembleConfig;
    use ndarray::{Array1, Array2};

    fn schema(names: &[&str]) -> Schema {
        let features = names
            .iter()
            .map(|n| FeatureSpec {
                name: n.to_string(),
                dtype: FeatureType::Float,
                origin: FeatureOrigin::Column { column: n.to_string() },
            })
            .collect();
        Schema::new(1, "CandidateID", None, features, FeatureRegistry::default()).unwrap()
    }

    fn fitted() -> BoostedEnsemble {
        let x = Array2::from_shape_vec((20, 2), (0..40).map(|i| i as f64).collect()).unwrap();
        let y = Array1::from_iter((0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }));
        let mut model = BoostedEnsemble::new(EnsembleConfig {
            n_estimators: 5,
            min_child_weight: 0.5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_width_must_match_schema() {
        let result = TrainedModel::new(&schema(&["a"]), HyperparameterConfig::new(), 0.5, fitted());
        assert!(matches!(result, Err(PerfError::SchemaMismatch(_))));
    }

    #[test]
    fn test_save_and_load() {
        let schema = schema(&["a", "b"]);
        let model = TrainedModel::new(&schema, HyperparameterConfig::new(), 0.75, fitted()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();

        let loaded = TrainedModel::load(&path).unwrap();
        assert_eq!(loaded.cv_score(), 0.75);
        assert_eq!(loaded.feature_names(), model.feature_names());
        assert!(loaded.ensure_schema(&schema).is_ok());

        let v = [3.0, 4.0];
        assert_eq!(
            loaded.predict_proba_one(&v).unwrap(),
            model.predict_proba_one(&v).unwrap()
        );
    }

    #[test]
    fn test_unknown_format_rejected() {
        let schema = schema(&["a", "b"]);
        let model = TrainedModel::new(&schema, HyperparameterConfig::new(), 0.75, fitted()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, raw.replace("\"format_version\": 1", "\"format_version\": 9")).unwrap();
        assert!(matches!(
            TrainedModel::load(&path),
            Err(PerfError::ArtifactVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_other_schema_rejected() {
        let model = TrainedModel::new(&schema(&["a", "b"]), HyperparameterConfig::new(), 0.5, fitted()).unwrap();
        assert!(matches!(
            model.ensure_schema(&schema(&["a", "c"])),
            Err(PerfError::ArtifactVersionMismatch { .. })
        ));
    }
}
