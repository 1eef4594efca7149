//! Feature schema reconciliation
//!
//! Training mode derives a [`Schema`] from the raw table and aligns the same
//! table under it. Inference mode aligns any table under a persisted schema:
//! absent features are zero-filled, unknown columns are dropped and present
//! values are cast to the declared type. Both modes share one alignment path,
//! so training and inference vectors have the same shape by construction.

use super::cell::Cell;
use super::config::ReconcileConfig;
use super::encoder::{canonical_category, indicator_features, observe_group, sanitize_name};
use super::schema::{FeatureOrigin, FeatureRegistry, FeatureSpec, FeatureType, Schema};
use crate::dataset::{CandidateId, Dataset, FeatureVector, Record};
use crate::error::{PerfError, Result};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// A raw row that could not be aligned; the rest of the batch is unaffected
#[derive(Debug)]
pub struct RejectedRecord {
    /// Zero-based row position in the raw table
    pub row: usize,
    pub candidate_id: Option<CandidateId>,
    pub error: PerfError,
}

/// Result of aligning an inference table
#[derive(Debug)]
pub struct ReconciledBatch {
    /// Aligned vectors in raw row order
    pub vectors: Vec<FeatureVector>,
    pub rejected: Vec<RejectedRecord>,
    /// Schema features with no raw source, filled with 0
    pub filled_features: Vec<String>,
    /// Raw columns not present in the schema
    pub dropped_columns: Vec<String>,
    /// Revision of the schema the vectors were aligned under
    pub schema_revision: u32,
    pub schema_fingerprint: String,
}

/// Result of a training-mode reconciliation
#[derive(Debug)]
pub struct TrainingTable {
    pub schema: Schema,
    pub dataset: Dataset,
    pub rejected: Vec<RejectedRecord>,
}

/// Maps raw tables onto the canonical feature schema
#[derive(Debug, Clone, Default)]
pub struct FeatureSchemaReconciler {
    config: ReconcileConfig,
}

impl FeatureSchemaReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Training mode: build a schema from `df` and align `df` under it.
    ///
    /// When `previous` is given the new schema is an extension of it: previous
    /// features keep their positions, newly observed ones are appended and the
    /// revision is bumped.
    pub fn fit(&self, df: &DataFrame, previous: Option<&Schema>) -> Result<TrainingTable> {
        let schema = self.build_schema(df, previous)?;
        let alignment = align(df, &schema, schema.label_column())?;

        let records: Vec<Record> = alignment
            .rows
            .into_iter()
            .map(|(features, label)| Record { features, label })
            .collect();
        let dataset = Dataset::new(schema.feature_names(), records)?;

        info!(
            version = %schema.version_tag(),
            n_features = schema.len(),
            n_records = dataset.len(),
            n_rejected = alignment.rejected.len(),
            "Schema built from training table"
        );
        for rejected in &alignment.rejected {
            warn!(row = rejected.row, error = %rejected.error, "Training record rejected");
        }

        Ok(TrainingTable {
            schema,
            dataset,
            rejected: alignment.rejected,
        })
    }

    /// Inference mode: align `df` under a persisted schema
    pub fn reconcile(&self, df: &DataFrame, schema: &Schema) -> Result<ReconciledBatch> {
        let alignment = align(df, schema, None)?;

        if !alignment.filled_features.is_empty() {
            debug!(
                count = alignment.filled_features.len(),
                features = ?alignment.filled_features,
                "Schema features absent from batch, filled with 0"
            );
        }
        if !alignment.dropped_columns.is_empty() {
            debug!(columns = ?alignment.dropped_columns, "Raw columns outside schema dropped");
        }
        for rejected in &alignment.rejected {
            warn!(row = rejected.row, error = %rejected.error, "Inference record rejected");
        }

        Ok(ReconciledBatch {
            vectors: alignment.rows.into_iter().map(|(vector, _)| vector).collect(),
            rejected: alignment.rejected,
            filled_features: alignment.filled_features,
            dropped_columns: alignment.dropped_columns,
            schema_revision: schema.revision(),
            schema_fingerprint: schema.fingerprint().to_string(),
        })
    }

    fn build_schema(&self, df: &DataFrame, previous: Option<&Schema>) -> Result<Schema> {
        let columns = ColumnIndex::new(df);
        let config = &self.config;

        if columns.get(&config.id_column).is_none() {
            return Err(PerfError::SchemaMismatch(format!(
                "id column `{}` is missing",
                config.id_column
            )));
        }
        if columns.get(&config.label_column).is_none() {
            return Err(PerfError::SchemaMismatch(format!(
                "label column `{}` is missing",
                config.label_column
            )));
        }

        let excluded: HashSet<String> = [&config.id_column, &config.label_column]
            .into_iter()
            .chain(config.drop_columns.iter())
            .map(|c| sanitize_name(c))
            .collect();
        let grouped: HashSet<String> = config
            .indicator_groups
            .iter()
            .flat_map(|g| g.sources.iter())
            .map(|c| sanitize_name(c))
            .collect();
        let explicit: HashSet<String> =
            config.categorical_columns.iter().map(|c| sanitize_name(c)).collect();

        let mut features = Vec::new();
        let mut groups = Vec::new();

        for column in df.get_columns() {
            let raw = column.name().as_str();
            let name = sanitize_name(raw);
            if excluded.contains(&name) || grouped.contains(&name) {
                continue;
            }
            match feature_type_of(column.dtype()) {
                Some(dtype) if !explicit.contains(&name) => features.push(FeatureSpec {
                    name,
                    dtype,
                    origin: FeatureOrigin::Column { column: raw.to_string() },
                }),
                _ => groups.push(observe_group(raw, &[column])),
            }
        }

        for group in &config.indicator_groups {
            let sources: Vec<&Column> =
                group.sources.iter().filter_map(|s| columns.get(s)).collect();
            if sources.is_empty() {
                warn!(group = %group.name, "No source column of indicator group is present");
                continue;
            }
            groups.push(observe_group(&group.name, &sources));
        }

        for group in &groups {
            features.extend(indicator_features(group));
        }
        let registry = FeatureRegistry::new(groups);

        let (features, registry) = match previous {
            Some(prev) => {
                let mut merged = prev.features().to_vec();
                for feature in features {
                    if prev.position(&feature.name).is_none() {
                        merged.push(feature);
                    }
                }
                (merged, prev.registry().merged_with(&registry))
            }
            None => (features, registry),
        };

        Schema::new(
            Schema::next_revision(previous),
            config.id_column.clone(),
            Some(config.label_column.clone()),
            features,
            registry,
        )
    }
}

/// Declared type of a non-categorical raw column, `None` for categorical ones
fn feature_type_of(dtype: &DataType) -> Option<FeatureType> {
    match dtype {
        DataType::Boolean => Some(FeatureType::Bool),
        DataType::Null => Some(FeatureType::Float),
        d if d.is_integer() => Some(FeatureType::Int),
        d if d.is_float() => Some(FeatureType::Float),
        _ => None,
    }
}

/// Raw columns keyed by sanitized name; the first of colliding names wins
struct ColumnIndex<'a> {
    by_name: HashMap<String, &'a Column>,
}

impl<'a> ColumnIndex<'a> {
    fn new(df: &'a DataFrame) -> Self {
        let mut by_name = HashMap::with_capacity(df.width());
        for column in df.get_columns() {
            let key = sanitize_name(column.name().as_str());
            if by_name.contains_key(&key) {
                warn!(column = %column.name(), "Column name collides after sanitizing, ignored");
                continue;
            }
            by_name.insert(key, column);
        }
        Self { by_name }
    }

    fn get(&self, raw: &str) -> Option<&'a Column> {
        self.by_name.get(&sanitize_name(raw)).copied()
    }

    fn names(&self) -> impl Iterator<Item = (&String, &&'a Column)> {
        self.by_name.iter()
    }
}

enum Source<'a> {
    Column(&'a Series),
    Indicator {
        present: &'a [HashSet<String>],
        category: &'a str,
    },
    Absent,
}

struct Alignment {
    rows: Vec<(FeatureVector, Option<bool>)>,
    rejected: Vec<RejectedRecord>,
    filled_features: Vec<String>,
    dropped_columns: Vec<String>,
}

fn align(df: &DataFrame, schema: &Schema, label_column: Option<&str>) -> Result<Alignment> {
    let columns = ColumnIndex::new(df);
    let registry = schema.registry();

    let id_series = columns
        .get(schema.id_column())
        .ok_or_else(|| {
            PerfError::SchemaMismatch(format!("id column `{}` is missing", schema.id_column()))
        })?
        .as_materialized_series();
    let label_series = match label_column {
        Some(name) => Some(
            columns
                .get(name)
                .ok_or_else(|| {
                    PerfError::SchemaMismatch(format!("label column `{}` is missing", name))
                })?
                .as_materialized_series(),
        ),
        None => None,
    };

    let mut used: HashSet<String> = HashSet::new();
    used.insert(sanitize_name(schema.id_column()));
    if let Some(label) = schema.label_column() {
        used.insert(sanitize_name(label));
    }

    // Canonical categories present per row, for every group with a raw source
    let mut group_rows: HashMap<&str, Vec<HashSet<String>>> = HashMap::new();
    for group in registry.groups() {
        let sources: Vec<&Column> = group.sources.iter().filter_map(|s| columns.get(s)).collect();
        if sources.is_empty() {
            continue;
        }
        let mut present = vec![HashSet::new(); df.height()];
        for column in sources {
            used.insert(sanitize_name(column.name().as_str()));
            let series = column.as_materialized_series();
            for (row, set) in present.iter_mut().enumerate() {
                if let Some(category) = canonical_category(&Cell::read(series, row)) {
                    if group.contains(&category) {
                        set.insert(category);
                    }
                }
            }
        }
        group_rows.insert(group.name.as_str(), present);
    }

    let mut filled_features = Vec::new();
    let plan: Vec<Source<'_>> = schema
        .features()
        .iter()
        .map(|feature| {
            let source = match &feature.origin {
                FeatureOrigin::Column { column } => match columns.get(column) {
                    Some(c) => {
                        used.insert(sanitize_name(column));
                        Source::Column(c.as_materialized_series())
                    }
                    None => Source::Absent,
                },
                FeatureOrigin::Indicator { group, category } => {
                    match group_rows.get(group.as_str()) {
                        Some(present) => Source::Indicator {
                            present: present.as_slice(),
                            category: category.as_str(),
                        },
                        None => Source::Absent,
                    }
                }
            };
            if matches!(source, Source::Absent) {
                filled_features.push(feature.name.clone());
            }
            source
        })
        .collect();

    let mut dropped_columns: Vec<String> = columns
        .names()
        .filter(|(key, _)| !used.contains(*key))
        .map(|(_, column)| column.name().to_string())
        .collect();
    dropped_columns.sort();

    let mut rows = Vec::with_capacity(df.height());
    let mut rejected = Vec::new();
    let mut seen = HashSet::with_capacity(df.height());

    for row in 0..df.height() {
        let candidate_id = match Cell::read(id_series, row).as_text() {
            Some(text) => CandidateId::new(text),
            None => {
                rejected.push(RejectedRecord {
                    row,
                    candidate_id: None,
                    error: PerfError::SchemaMismatch(format!("row {} has no candidate id", row)),
                });
                continue;
            }
        };

        if seen.contains(&candidate_id) {
            rejected.push(RejectedRecord {
                row,
                error: PerfError::DataError(format!("duplicate candidate id {}", candidate_id)),
                candidate_id: Some(candidate_id),
            });
            continue;
        }

        let label = match label_series {
            Some(series) => match Cell::read(series, row).cast(FeatureType::Bool) {
                Ok(v) => Some(v == 1.0),
                Err(reason) => {
                    rejected.push(RejectedRecord {
                        row,
                        error: PerfError::DataError(format!(
                            "candidate {}: invalid label, {}",
                            candidate_id, reason
                        )),
                        candidate_id: Some(candidate_id),
                    });
                    continue;
                }
            },
            None => None,
        };

        match align_row(schema.features(), &plan, row) {
            Ok(values) => {
                seen.insert(candidate_id.clone());
                rows.push((FeatureVector::new(candidate_id, values), label));
            }
            Err(reason) => rejected.push(RejectedRecord {
                row,
                error: PerfError::SchemaMismatch(format!("candidate {}: {}", candidate_id, reason)),
                candidate_id: Some(candidate_id),
            }),
        }
    }

    Ok(Alignment {
        rows,
        rejected,
        filled_features,
        dropped_columns,
    })
}

fn align_row(
    features: &[FeatureSpec],
    plan: &[Source<'_>],
    row: usize,
) -> std::result::Result<Vec<f64>, String> {
    features
        .iter()
        .zip(plan)
        .map(|(feature, source)| match source {
            Source::Column(series) => Cell::read(series, row)
                .cast(feature.dtype)
                .map_err(|reason| format!("feature `{}`: {}", feature.name, reason)),
            Source::Indicator { present, category } => {
                Ok(if present[row].contains(*category) { 1.0 } else { 0.0 })
            }
            Source::Absent => Ok(0.0),
        })
        .collect()
}
