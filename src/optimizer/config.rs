//! Optimization configuration

use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerType {
    /// Uniform random sampling
    Random,
    /// Tree-structured Parzen Estimator
    Tpe,
}

/// Configuration for hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Number of trials to run; every trial runs, there is no early stop
    pub n_trials: usize,

    pub sampler: SamplerType,

    /// Random trials before the TPE model kicks in
    pub n_startup_trials: usize,

    /// Fraction of history treated as "good" by TPE
    pub gamma: f64,

    /// Candidates drawn from the good density per TPE step
    pub n_candidates: usize,

    /// Sampler seed
    pub seed: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_trials: 20,
            sampler: SamplerType::Tpe,
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
            seed: 42,
        }
    }
}

impl OptimizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizationConfig::default();
        assert_eq!(config.n_trials, 20);
        assert_eq!(config.sampler, SamplerType::Tpe);
    }

    #[test]
    fn test_builder() {
        let config = OptimizationConfig::new()
            .with_n_trials(50)
            .with_sampler(SamplerType::Random)
            .with_seed(7);

        assert_eq!(config.n_trials, 50);
        assert_eq!(config.sampler, SamplerType::Random);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_sampler_names() {
        let config: OptimizationConfig = serde_json::from_str(r#"{"sampler": "random"}"#).unwrap();
        assert_eq!(config.sampler, SamplerType::Random);
        assert_eq!(config.n_startup_trials, 10);
    }
}
