//! Feature schema reconciliation
//!
//! Turns raw candidate tables into fixed-width feature vectors:
//! - Categorical columns and multi-column groups become indicator features
//! - Column names are sanitized to a canonical form
//! - The resulting feature contract is persisted as a versioned [`Schema`]
//! - Later tables are aligned to that schema (zero-fill, drop, exact cast)

mod cell;
mod config;
mod encoder;
mod reconciler;
mod schema;

pub use cell::Cell;
pub use config::{IndicatorGroup, ReconcileConfig};
pub use encoder::{indicator_name, sanitize_name};
pub use reconciler::{FeatureSchemaReconciler, ReconciledBatch, RejectedRecord, TrainingTable};
pub use schema::{CategoryGroup, FeatureOrigin, FeatureRegistry, FeatureSpec, FeatureType, Schema};
