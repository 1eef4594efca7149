//! Versioned feature schema
//!
//! The schema is the canonical feature contract: an ordered list of typed
//! features plus the registry of enumerated categories that produced the
//! indicator features. It is built once per training run, persisted, and
//! read-only afterwards. A retraining run that is handed the previous schema
//! produces a new revision instead of editing the old one.

use crate::error::{PerfError, Result};
use crate::utils::fs::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Declared type of a feature, persisted as `int`, `float` or `bool`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Int,
    Float,
    Bool,
}

impl FeatureType {
    pub fn tag(&self) -> &'static str {
        match self {
            FeatureType::Int => "int",
            FeatureType::Float => "float",
            FeatureType::Bool => "bool",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Where a feature's value comes from in the raw table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureOrigin {
    /// Copied from a raw column and cast to the declared type
    Column { column: String },
    /// 1 when any source column of `group` holds `category`, else 0
    Indicator { group: String, category: String },
}

/// One feature of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub dtype: FeatureType,
    pub origin: FeatureOrigin,
}

/// Enumerated categories of one categorical group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    /// Group name, used as the indicator name prefix
    pub name: String,
    /// Raw columns feeding the group
    pub sources: Vec<String>,
    /// Canonical categories in indicator order
    pub categories: Vec<String>,
}

impl CategoryGroup {
    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// Typed registry of categorical groups, populated once when the schema is built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRegistry {
    groups: Vec<CategoryGroup>,
}

impl FeatureRegistry {
    pub fn new(groups: Vec<CategoryGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&CategoryGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Union with a newer registry: existing categories keep their order,
    /// new ones are appended.
    pub fn merged_with(&self, newer: &FeatureRegistry) -> FeatureRegistry {
        let mut groups = self.groups.clone();
        for incoming in &newer.groups {
            match groups.iter_mut().find(|g| g.name == incoming.name) {
                Some(existing) => {
                    for source in &incoming.sources {
                        if !existing.sources.contains(source) {
                            existing.sources.push(source.clone());
                        }
                    }
                    for category in &incoming.categories {
                        if !existing.contains(category) {
                            existing.categories.push(category.clone());
                        }
                    }
                }
                None => groups.push(incoming.clone()),
            }
        }
        FeatureRegistry { groups }
    }
}

/// Persisted canonical feature contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    revision: u32,
    fingerprint: String,
    created_at: DateTime<Utc>,
    id_column: String,
    label_column: Option<String>,
    features: Vec<FeatureSpec>,
    registry: FeatureRegistry,
}

impl Schema {
    /// Build a schema, rejecting duplicate feature names
    pub fn new(
        revision: u32,
        id_column: impl Into<String>,
        label_column: Option<String>,
        features: Vec<FeatureSpec>,
        registry: FeatureRegistry,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(features.len());
        for feature in &features {
            if !seen.insert(feature.name.as_str()) {
                return Err(PerfError::SchemaMismatch(format!(
                    "feature name `{}` is produced twice",
                    feature.name
                )));
            }
        }
        if features.is_empty() {
            return Err(PerfError::SchemaMismatch("schema has no features".to_string()));
        }

        let fingerprint = fingerprint_of(&features);
        Ok(Self {
            revision,
            fingerprint,
            created_at: Utc::now(),
            id_column: id_column.into(),
            label_column,
            features,
            registry,
        })
    }

    /// Revision for a schema built on top of `previous`
    pub fn next_revision(previous: Option<&Schema>) -> u32 {
        previous.map_or(1, |p| p.revision + 1)
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn label_column(&self) -> Option<&str> {
        self.label_column.as_deref()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Short human-readable version tag, e.g. `r2:3fa94c01d2e7`
    pub fn version_tag(&self) -> String {
        format!("r{}:{}", self.revision, &self.fingerprint[..12.min(self.fingerprint.len())])
    }

    /// Fail unless an artifact bound to (`revision`, `fingerprint`) matches this schema
    pub fn ensure_compatible(&self, revision: u32, fingerprint: &str) -> Result<()> {
        if self.revision != revision || self.fingerprint != fingerprint {
            return Err(PerfError::ArtifactVersionMismatch {
                expected: self.version_tag(),
                found: format!("r{}:{}", revision, &fingerprint[..12.min(fingerprint.len())]),
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
            version = %self.version_tag(),
            n_features = self.len(),
            "Schema saved"
        );
        Ok(())
    }

    /// Load a schema file; a fingerprint that does not match the feature list is rejected
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let schema: Schema = read_json(path.as_ref())?;
        let actual = fingerprint_of(&schema.features);
        if actual != schema.fingerprint {
            return Err(PerfError::ArtifactVersionMismatch {
                expected: schema.fingerprint.clone(),
                found: actual,
            });
        }
        Ok(schema)
    }
}

/// SHA-256 over the ordered `(name, dtype)` list
fn fingerprint_of(features: &[FeatureSpec]) -> String {
    let mut hasher = Sha256::new();
    for feature in features {
        hasher.update(feature.name.as_bytes());
        hasher.update(b"\t");
        hasher.update(feature.dtype.tag().as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
