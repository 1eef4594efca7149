//! Candidate records and feature vectors shared by every pipeline stage
//!
//! Everything here is immutable once built: stages hand each other new
//! values instead of mutating a shared table.

use crate::error::{PerfError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Canonical candidate identifier (trimmed, uppercase)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Feature values of one candidate, ordered by the schema that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    candidate_id: CandidateId,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(candidate_id: CandidateId, values: Vec<f64>) -> Self {
        Self { candidate_id, values }
    }

    pub fn candidate_id(&self) -> &CandidateId {
        &self.candidate_id
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A feature vector with its optional binary outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub features: FeatureVector,
    pub label: Option<bool>,
}

impl Record {
    pub fn id(&self) -> &CandidateId {
        self.features.candidate_id()
    }
}

/// Ordered collection of records sharing one feature layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    feature_names: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, checking vector widths and id uniqueness
    pub fn new(feature_names: Vec<String>, records: Vec<Record>) -> Result<Self> {
        let width = feature_names.len();
        let mut seen = HashSet::with_capacity(records.len());

        for record in &records {
            if record.features.len() != width {
                return Err(PerfError::ShapeError {
                    expected: format!("{} features", width),
                    actual: format!("{} features for {}", record.features.len(), record.id()),
                });
            }
            if !seen.insert(record.id().clone()) {
                return Err(PerfError::DataError(format!(
                    "duplicate candidate id {}",
                    record.id()
                )));
            }
        }

        Ok(Self { feature_names, records })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records labelled positive
    pub fn positive_count(&self) -> usize {
        self.records.iter().filter(|r| r.label == Some(true)).count()
    }

    /// Feature matrix and label vector for the given record indices.
    ///
    /// Rows are emitted in candidate-id order, so the caller's index order never
    /// changes what a model sees. Every selected record must be labelled.
    pub fn design_matrix(&self, indices: &[usize]) -> Result<(Array2<f64>, Array1<f64>)> {
        let mut ordered: Vec<&Record> = indices
            .iter()
            .map(|&idx| {
                self.records.get(idx).ok_or_else(|| {
                    PerfError::DataError(format!("record index {} out of range", idx))
                })
            })
            .collect::<Result<_>>()?;
        ordered.sort_by(|a, b| a.id().cmp(b.id()));

        let width = self.n_features();
        let mut values = Vec::with_capacity(ordered.len() * width);
        let mut labels = Vec::with_capacity(ordered.len());

        for record in &ordered {
            let label = record.label.ok_or_else(|| {
                PerfError::InsufficientData(format!("record {} has no label", record.id()))
            })?;
            values.extend_from_slice(record.features.values());
            labels.push(if label { 1.0 } else { 0.0 });
        }

        let x = Array2::from_shape_vec((ordered.len(), width), values)?;
        Ok((x, Array1::from_vec(labels)))
    }

    /// Matrix over every record
    pub fn full_matrix(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        let all: Vec<usize> = (0..self.records.len()).collect();
        self.design_matrix(&all)
    }
}
