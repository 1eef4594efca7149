//! Search space definition for hyperparameters
//!
//! Every parameter lives on a finite grid (integer steps, discrete float steps)
//! or a log-scaled continuous range. Samplers work in a normalized `[0, 1]`
//! internal space; [`Parameter::from_internal`] snaps back onto the grid.

use crate::error::{PerfError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterType {
    /// Integer on `low, low + step, ..., high`
    Int { low: i64, high: i64, step: i64 },
    /// Continuous float, sampled uniformly in log space
    LogUniform { low: f64, high: f64 },
    /// Float on `low, low + step, ..., high`
    DiscreteUniform { low: f64, high: f64, step: f64 },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn int(name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high, step },
        }
    }

    pub fn log_uniform(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::LogUniform { low, high },
        }
    }

    pub fn discrete_uniform(name: impl Into<String>, low: f64, high: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::DiscreteUniform { low, high, step },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |reason: &str| {
            Err(PerfError::invalid_parameter(&self.name, format!("{:?}", self.param_type), reason))
        };
        match self.param_type {
            ParameterType::Int { low, high, step } => {
                if low > high {
                    return bad("low exceeds high");
                }
                if step <= 0 {
                    return bad("step must be positive");
                }
            }
            ParameterType::LogUniform { low, high } => {
                if !(low > 0.0 && low.is_finite() && high.is_finite()) {
                    return bad("log-uniform bounds must be positive and finite");
                }
                if low > high {
                    return bad("low exceeds high");
                }
            }
            ParameterType::DiscreteUniform { low, high, step } => {
                if !(low.is_finite() && high.is_finite()) || low > high {
                    return bad("bounds must be finite with low <= high");
                }
                if !(step > 0.0) {
                    return bad("step must be positive");
                }
            }
        }
        Ok(())
    }

    /// Number of grid steps above `low`, `None` for continuous parameters
    fn n_steps(&self) -> Option<i64> {
        match self.param_type {
            ParameterType::Int { low, high, step } => Some((high - low) / step),
            ParameterType::DiscreteUniform { low, high, step } => {
                Some(((high - low) / step + 1e-9).floor() as i64)
            }
            ParameterType::LogUniform { .. } => None,
        }
    }

    fn grid_value(&self, k: i64) -> ParameterValue {
        match self.param_type {
            ParameterType::Int { low, step, .. } => ParameterValue::Int(low + k * step),
            ParameterType::DiscreteUniform { low, step, .. } => {
                ParameterValue::Float(round_grid(low + k as f64 * step))
            }
            ParameterType::LogUniform { low, .. } => ParameterValue::Float(low),
        }
    }

    /// Sample a value uniformly over the grid (or log range)
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match (self.n_steps(), &self.param_type) {
            (_, ParameterType::LogUniform { low, high }) => {
                let (log_low, log_high) = (low.ln(), high.ln());
                ParameterValue::Float(
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp().clamp(*low, *high),
                )
            }
            (Some(n), _) => self.grid_value(rng.gen_range(0..=n)),
            (None, _) => self.from_internal(rng.gen()),
        }
    }

    /// Position of `value` in the normalized `[0, 1]` space
    pub fn to_internal(&self, value: &ParameterValue) -> f64 {
        let v = value.as_float();
        let u = match self.param_type {
            ParameterType::Int { low, high, .. } => {
                if high == low {
                    0.5
                } else {
                    (v - low as f64) / (high - low) as f64
                }
            }
            ParameterType::DiscreteUniform { low, high, .. } => {
                if high == low {
                    0.5
                } else {
                    (v - low) / (high - low)
                }
            }
            ParameterType::LogUniform { low, high } => {
                if high == low {
                    0.5
                } else {
                    (v.ln() - low.ln()) / (high.ln() - low.ln())
                }
            }
        };
        u.clamp(0.0, 1.0)
    }

    /// Value at normalized position `u`, snapped to the declared grid
    pub fn from_internal(&self, u: f64) -> ParameterValue {
        let u = if u.is_finite() { u.clamp(0.0, 1.0) } else { 0.5 };
        match self.param_type {
            ParameterType::LogUniform { low, high } => {
                let v = (low.ln() + u * (high.ln() - low.ln())).exp();
                ParameterValue::Float(v.clamp(low, high))
            }
            _ => {
                let n = self.n_steps().unwrap_or(0);
                let k = (u * n as f64).round() as i64;
                self.grid_value(k.clamp(0, n))
            }
        }
    }

    /// Whether `value` lies within bounds and on the grid
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self.param_type, value) {
            (ParameterType::Int { low, high, step }, ParameterValue::Int(v)) => {
                *v >= low && *v <= high && (v - low) % step == 0
            }
            (ParameterType::LogUniform { low, high }, v) => {
                let v = v.as_float();
                v >= low * (1.0 - 1e-12) && v <= high * (1.0 + 1e-12)
            }
            (ParameterType::DiscreteUniform { low, high, step }, v) => {
                let v = v.as_float();
                let k = (v - low) / step;
                v >= low - 1e-9 && v <= high + 1e-9 && (k - k.round()).abs() < 1e-6
            }
            _ => false,
        }
    }
}

fn round_grid(v: f64) -> f64 {
    (v * 1e10).round() / 1e10
}

/// Sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_float(&self) -> f64 {
        match self {
            ParameterValue::Int(v) => *v as f64,
            ParameterValue::Float(v) => *v,
        }
    }

    /// Integer view; floats are rounded
    pub fn as_int(&self) -> i64 {
        match self {
            ParameterValue::Int(v) => *v,
            ParameterValue::Float(v) => v.round() as i64,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One sampled configuration, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterConfig(BTreeMap<String, ParameterValue>);

impl HyperparameterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HyperparameterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Space tuned by default for the boosted ensemble
    pub fn boosting() -> Self {
        Self::new()
            .int("n_estimators", 200, 2000, 100)
            .discrete_uniform("subsample", 0.6, 1.0, 0.1)
            .log_uniform("eta", 1e-3, 0.1)
            .discrete_uniform("colsample_bytree", 0.6, 1.0, 0.1)
            .int("reg_alpha", 1, 50, 1)
            .int("reg_lambda", 5, 100, 1)
            .int("max_depth", 5, 20, 1)
            .int("min_child_weight", 5, 20, 1)
    }

    /// Add a parameter, replacing any parameter with the same name
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.retain(|p| p.name != param.name);
        self.parameters.push(param);
        self
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64, step: i64) -> Self {
        self.add(Parameter::int(name, low, high, step))
    }

    pub fn log_uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_uniform(name, low, high))
    }

    pub fn discrete_uniform(self, name: impl Into<String>, low: f64, high: f64, step: f64) -> Self {
        self.add(Parameter::discrete_uniform(name, low, high, step))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(PerfError::ConfigError("search space is empty".to_string()));
        }
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> HyperparameterConfig {
        let mut config = HyperparameterConfig::new();
        for p in &self.parameters {
            config.insert(p.name.clone(), p.sample(rng));
        }
        config
    }

    /// Every parameter present, within bounds and on its grid
    pub fn contains(&self, config: &HyperparameterConfig) -> bool {
        self.parameters
            .iter()
            .all(|p| config.get(&p.name).is_some_and(|v| p.contains(&v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_boosting_space() {
        let space = SearchSpace::boosting();
        assert_eq!(space.len(), 8);
        assert!(space.validate().is_ok());
        assert_eq!(space.param_names()[0], "n_estimators");
    }

    #[test]
    fn test_samples_stay_on_grid() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = SearchSpace::boosting();

        for _ in 0..200 {
            let config = space.sample(&mut rng);
            assert!(space.contains(&config), "off-grid sample {}", config);
            let n = config.get("n_estimators").unwrap().as_int();
            assert!((200..=2000).contains(&n) && n % 100 == 0);
        }
    }

    #[test]
    fn test_internal_round_trip_snaps() {
        let p = Parameter::discrete_uniform("subsample", 0.6, 1.0, 0.1);
        assert_eq!(p.from_internal(0.0), ParameterValue::Float(0.6));
        assert_eq!(p.from_internal(1.0), ParameterValue::Float(1.0));
        assert_eq!(p.from_internal(0.49), ParameterValue::Float(0.8));
        assert!((p.to_internal(&ParameterValue::Float(0.8)) - 0.5).abs() < 1e-9);

        let q = Parameter::int("max_depth", 5, 20, 1);
        assert_eq!(q.from_internal(2.0), ParameterValue::Int(20));
        assert_eq!(q.from_internal(f64::NAN), ParameterValue::Int(13));
    }

    #[test]
    fn test_log_uniform_internal_space() {
        let p = Parameter::log_uniform("eta", 1e-3, 0.1);
        let mid = p.from_internal(0.5).as_float();
        assert!((mid - 0.01).abs() < 1e-9);
        assert!((p.to_internal(&ParameterValue::Float(0.01)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Parameter::int("a", 5, 1, 1).validate().is_err());
        assert!(Parameter::int("a", 1, 5, 0).validate().is_err());
        assert!(Parameter::log_uniform("b", 0.0, 1.0).validate().is_err());
        assert!(SearchSpace::new().validate().is_err());
    }

    #[test]
    fn test_config_serializes_plainly() {
        let config = HyperparameterConfig::new()
            .with("max_depth", ParameterValue::Int(6))
            .with("eta", ParameterValue::Float(0.05));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"eta":0.05,"max_depth":6}"#);
        let back: HyperparameterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
