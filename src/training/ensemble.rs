//! Second-order gradient boosted trees with logistic loss
//!
//! - Gradient and hessian of the log loss drive every tree
//! - Regularized leaf weights: w* = -soft(G, alpha) / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Minimum child weight (hessian sum) per leaf
//! - Row and column subsampling from a seeded generator
//! - Missing values (NaN) always follow the right branch

use crate::error::{PerfError, Result};
use crate::optimizer::HyperparameterConfig;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Ensemble configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub n_estimators: usize,
    /// Shrinkage applied to every tree (`eta`)
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub seed: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            seed: 42,
        }
    }
}

impl EnsembleConfig {
    /// Defaults overridden by every parameter present in `params`
    pub fn from_hyperparameters(params: &HyperparameterConfig, seed: u64) -> Result<Self> {
        let mut config = Self { seed, ..Self::default() };

        for (name, value) in params.iter() {
            match name.as_str() {
                "n_estimators" => config.n_estimators = non_negative(name, value.as_int())?,
                "max_depth" => config.max_depth = non_negative(name, value.as_int())?,
                "eta" | "learning_rate" => config.learning_rate = value.as_float(),
                "min_child_weight" => config.min_child_weight = value.as_float(),
                "reg_lambda" => config.reg_lambda = value.as_float(),
                "reg_alpha" => config.reg_alpha = value.as_float(),
                "gamma" => config.gamma = value.as_float(),
                "subsample" => config.subsample = value.as_float(),
                "colsample_bytree" => config.colsample_bytree = value.as_float(),
                other => {
                    return Err(PerfError::invalid_parameter(
                        other,
                        value,
                        "not a parameter of the boosted ensemble",
                    ))
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PerfError::invalid_parameter("n_estimators", 0, "must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(PerfError::invalid_parameter("eta", self.learning_rate, "must be positive"));
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PerfError::invalid_parameter(name, ratio, "must be in (0, 1]"));
            }
        }
        for (name, v) in [
            ("reg_lambda", self.reg_lambda),
            ("reg_alpha", self.reg_alpha),
            ("gamma", self.gamma),
            ("min_child_weight", self.min_child_weight),
        ] {
            if !(v >= 0.0 && v.is_finite()) {
                return Err(PerfError::invalid_parameter(name, v, "must be non-negative"));
            }
        }
        Ok(())
    }
}

fn non_negative(name: &str, v: i64) -> Result<usize> {
    usize::try_from(v).map_err(|_| PerfError::invalid_parameter(name, v, "must be non-negative"))
}

/// A single node of a boosted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<'_, f64>) -> f64 {
        match self {
            TreeNode::Leaf { weight } => *weight,
            TreeNode::Split { feature, threshold, left, right, .. } => {
                // NaN compares false and goes right
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn accumulate_gain(&self, gains: &mut [f64]) {
        if let TreeNode::Split { feature, gain, left, right, .. } = self {
            if let Some(g) = gains.get_mut(*feature) {
                *g += gain;
            }
            left.accumulate_gain(gains);
            right.accumulate_gain(gains);
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Gradient statistics shared by every node of one tree
struct GradStats<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    config: &'a EnsembleConfig,
}

impl GradStats<'_> {
    /// Build a tree using exact greedy split finding
    fn build(&self, indices: &[usize], features: &[usize], depth: usize) -> TreeNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let c = self.config;

        let leaf = TreeNode::Leaf {
            weight: leaf_weight(g_sum, h_sum, c.reg_lambda, c.reg_alpha),
        };

        if depth >= c.max_depth || indices.len() < 2 || h_sum < c.min_child_weight {
            return leaf;
        }

        let candidates: Vec<SplitCandidate> = features
            .par_iter()
            .filter_map(|&f| self.best_split(indices, f, g_sum, h_sum))
            .collect();

        // Highest gain wins; ties keep the lower feature position
        let mut best: Option<&SplitCandidate> = None;
        for candidate in &candidates {
            if best.map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }

        match best {
            Some(split) if split.gain > c.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[[i, split.feature]] <= split.threshold);

                if left_idx.is_empty() || right_idx.is_empty() {
                    return leaf;
                }

                TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    gain: split.gain - c.gamma,
                    left: Box::new(self.build(&left_idx, features, depth + 1)),
                    right: Box::new(self.build(&right_idx, features, depth + 1)),
                }
            }
            _ => leaf,
        }
    }

    /// Best split of one feature; rows with a missing value stay on the right
    fn best_split(
        &self,
        indices: &[usize],
        feature: usize,
        g_total: f64,
        h_total: f64,
    ) -> Option<SplitCandidate> {
        let x = self.x;
        let mut present: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| !x[[i, feature]].is_nan())
            .collect();
        present.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let lambda = self.config.reg_lambda;
        let min_child = self.config.min_child_weight;
        let parent_score = (g_total * g_total) / (h_total + lambda);

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for (pos, &idx) in present.iter().enumerate() {
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let Some(&next) = present.get(pos + 1) else {
                break;
            };
            let (value, next_value) = (x[[idx, feature]], x[[next, feature]]);
            if next_value - value < 1e-12 {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < min_child || h_right < min_child {
                continue;
            }

            let gain = 0.5
                * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                    - parent_score);

            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (value + next_value) / 2.0,
                    gain,
                });
            }
        }

        best
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Binary boosted tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedEnsemble {
    config: EnsembleConfig,
    trees: Vec<TreeNode>,
    base_score: f64,
    n_features: usize,
}

impl BoostedEnsemble {
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    /// Fit on a 0/1 label vector
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let (n_samples, n_features) = x.dim();
        if n_samples != y.len() {
            return Err(PerfError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PerfError::InsufficientData("empty training matrix".to_string()));
        }
        self.config.validate()?;

        let positives = y.iter().filter(|&&v| v >= 0.5).count();
        if positives == 0 || positives == n_samples {
            return Err(PerfError::ConvergenceError {
                iterations: 0,
                reason: "training labels contain a single class".to_string(),
            });
        }

        // Base score in log-odds space
        let p = (positives as f64 / n_samples as f64).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        self.n_features = n_features;
        self.trees.clear();

        let mut raw = Array1::from_elem(n_samples, self.base_score);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);

        for round in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs = raw.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let cols = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let stats = GradStats {
                x,
                grad: &grad,
                hess: &hess,
                config: &self.config,
            };
            let tree = stats.build(&rows, &cols, 0);

            for (i, r) in raw.iter_mut().enumerate() {
                *r += self.config.learning_rate * tree.predict(x.row(i));
            }
            if raw.iter().any(|v| !v.is_finite()) {
                return Err(PerfError::ConvergenceError {
                    iterations: round + 1,
                    reason: "raw margins became non-finite".to_string(),
                });
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    fn margin(&self, sample: ArrayView1<'_, f64>) -> f64 {
        self.trees.iter().fold(self.base_score, |acc, tree| {
            acc + self.config.learning_rate * tree.predict(sample)
        })
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if !self.is_fitted() {
            return Err(PerfError::ModelNotFitted);
        }
        if width != self.n_features {
            return Err(PerfError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }

    /// Positive-class probability of one sample
    pub fn predict_proba_one(&self, sample: &[f64]) -> Result<f64> {
        self.check_width(sample.len())?;
        Ok(sigmoid(self.margin(ArrayView1::from(sample))))
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x.ncols())?;
        Ok(x.rows().into_iter().map(|row| sigmoid(self.margin(row))).collect())
    }

    /// Decisions: 1 iff the positive probability strictly exceeds the negative one
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p > 1.0 - p { 1.0 } else { 0.0 }))
    }

    /// Total split gain per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(PerfError::ModelNotFitted);
        }
        let mut gains = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.accumulate_gain(&mut gains);
        }
        let total: f64 = gains.iter().sum();
        if total > 0.0 {
            gains.iter_mut().for_each(|g| *g /= total);
        }
        Ok(Array1::from_vec(gains))
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    fn accuracy(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
        let correct = pred.iter().zip(y.iter()).filter(|(p, a)| (*p - *a).abs() < 0.5).count();
        correct as f64 / y.len() as f64
    }

    #[test]
    fn test_fit_separable_data() {
        let (x, y) = classification_data();
        let mut model = BoostedEnsemble::new(EnsembleConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let acc = accuracy(&model.predict(&x).unwrap(), &y);
        assert!(acc >= 0.9, "accuracy = {}", acc);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = classification_data();
        let config = EnsembleConfig {
            n_estimators: 20,
            subsample: 0.7,
            colsample_bytree: 0.5,
            ..Default::default()
        };
        let mut a = BoostedEnsemble::new(config.clone());
        let mut b = BoostedEnsemble::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_fails() {
        let (x, _) = classification_data();
        let y = Array1::from_elem(50, 1.0);
        let mut model = BoostedEnsemble::new(EnsembleConfig::default());
        assert!(matches!(model.fit(&x, &y), Err(PerfError::ConvergenceError { .. })));
    }

    #[test]
    fn test_missing_values_go_right() {
        let x = Array2::from_shape_vec((8, 1), vec![1.0, 2.0, 3.0, 4.0, 10.0, 11.0, 12.0, 13.0]).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let mut model = BoostedEnsemble::new(EnsembleConfig {
            n_estimators: 20,
            max_depth: 1,
            min_child_weight: 0.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let p_nan = model.predict_proba_one(&[f64::NAN]).unwrap();
        let p_high = model.predict_proba_one(&[12.0]).unwrap();
        assert_eq!(p_nan, p_high);
        assert!(p_high > 0.5);
    }

    #[test]
    fn test_width_checked() {
        let (x, y) = classification_data();
        let mut model = BoostedEnsemble::new(EnsembleConfig { n_estimators: 5, ..Default::default() });
        assert!(matches!(model.predict_proba_one(&[1.0, 2.0]), Err(PerfError::ModelNotFitted)));
        model.fit(&x, &y).unwrap();
        assert!(matches!(model.predict_proba_one(&[1.0]), Err(PerfError::ShapeError { .. })));
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = classification_data();
        let mut model = BoostedEnsemble::new(EnsembleConfig { n_estimators: 10, ..Default::default() });
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_from_hyperparameters() {
        let params = HyperparameterConfig::new()
            .with("n_estimators", ParameterValue::Int(300))
            .with("eta", ParameterValue::Float(0.05))
            .with("subsample", ParameterValue::Float(0.8));
        let config = EnsembleConfig::from_hyperparameters(&params, 7).unwrap();
        assert_eq!(config.n_estimators, 300);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.subsample, 0.8);
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.seed, 7);

        let bad = HyperparameterConfig::new().with("booster", ParameterValue::Int(1));
        assert!(EnsembleConfig::from_hyperparameters(&bad, 7).is_err());
        let bad = HyperparameterConfig::new().with("subsample", ParameterValue::Float(1.5));
        assert!(EnsembleConfig::from_hyperparameters(&bad, 7).is_err());
    }
}
