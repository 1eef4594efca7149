//! Categorical indicator encoding
//!
//! One-hot expansion of categorical columns. Category values and feature names
//! are canonicalized the same way, so `"Retail "` in column `Industry` always
//! lands in feature `industry_retail`.

use super::cell::Cell;
use super::schema::{CategoryGroup, FeatureOrigin, FeatureSpec, FeatureType};
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\W+").expect("static regex is valid")
});

/// Lowercase a raw name and collapse every run of non-word characters to `_`
pub fn sanitize_name(raw: &str) -> String {
    NON_WORD.replace_all(raw.trim(), "_").to_lowercase()
}

/// Canonical category of a raw cell, `None` for missing values
pub fn canonical_category(cell: &Cell) -> Option<String> {
    cell.as_text().map(|text| sanitize_name(&text))
}

/// Feature name of the indicator for `category` in `group`
pub fn indicator_name(group: &str, category: &str) -> String {
    sanitize_name(&format!("{}_{}", group, category))
}

/// Collect the distinct categories of a group across its source columns
pub fn observe_group(name: &str, sources: &[&Column]) -> CategoryGroup {
    let mut categories = BTreeSet::new();

    for column in sources {
        let series = column.as_materialized_series();
        for row in 0..series.len() {
            if let Some(category) = canonical_category(&Cell::read(series, row)) {
                categories.insert(category);
            }
        }
    }

    CategoryGroup {
        name: name.to_string(),
        sources: sources.iter().map(|c| c.name().to_string()).collect(),
        categories: categories.into_iter().collect(),
    }
}

/// Indicator features for a group, in registry order
pub fn indicator_features(group: &CategoryGroup) -> Vec<FeatureSpec> {
    group
        .categories
        .iter()
        .map(|category| FeatureSpec {
            name: indicator_name(&group.name, category),
            dtype: FeatureType::Bool,
            origin: FeatureOrigin::Indicator {
                group: group.name.clone(),
                category: category.clone(),
            },
        })
        .collect()
}
