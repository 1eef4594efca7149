//! Inference configuration

use serde::{Deserialize, Serialize};

/// Configuration for scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Vectors scored per parallel work unit
    pub batch_size: usize,

    /// Below this many vectors scoring stays on the calling thread
    pub parallel_threshold: usize,

    /// Header of the identifier column in written predictions
    pub output_id_column: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            parallel_threshold: 1024,
            output_id_column: "CandidateID".to_string(),
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_parallel_threshold(mut self, n: usize) -> Self {
        self.parallel_threshold = n;
        self
    }

    pub fn with_output_id_column(mut self, column: impl Into<String>) -> Self {
        self.output_id_column = column.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: InferenceConfig = serde_json::from_str(r#"{"batch_size": 8}"#).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.output_id_column, "CandidateID");
    }

    #[test]
    fn test_batch_size_never_zero() {
        assert_eq!(InferenceConfig::new().with_batch_size(0).batch_size, 1);
    }
}
