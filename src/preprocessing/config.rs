//! Reconciliation configuration

use serde::{Deserialize, Serialize};

/// Several raw columns sharing one set of indicator features
///
/// For example residence and branch state both feed `state_*` indicators; an
/// indicator is set when either column holds the category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorGroup {
    pub name: String,
    pub sources: Vec<String>,
}

impl IndicatorGroup {
    pub fn new(name: impl Into<String>, sources: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            sources: sources.into_iter().map(String::from).collect(),
        }
    }
}

/// Configuration for schema reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Column holding the candidate identifier
    pub id_column: String,

    /// Binary outcome column (training only)
    pub label_column: String,

    /// Columns to encode as indicators even when they are not strings
    pub categorical_columns: Vec<String>,

    /// Multi-column indicator groups
    pub indicator_groups: Vec<IndicatorGroup>,

    /// Columns never used as features
    pub drop_columns: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            id_column: "CandidateID".to_string(),
            label_column: "Performance".to_string(),
            categorical_columns: Vec::new(),
            indicator_groups: Vec::new(),
            drop_columns: Vec::new(),
        }
    }
}

impl ReconcileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    pub fn with_categorical(mut self, column: impl Into<String>) -> Self {
        self.categorical_columns.push(column.into());
        self
    }

    pub fn with_indicator_group(mut self, group: IndicatorGroup) -> Self {
        self.indicator_groups.push(group);
        self
    }

    pub fn with_drop_column(mut self, column: impl Into<String>) -> Self {
        self.drop_columns.push(column.into());
        self
    }
}
