//! Sampling strategies for hyperparameter optimization

use super::config::{OptimizationConfig, SamplerType};
use super::search_space::{HyperparameterConfig, Parameter, SearchSpace};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::f64::consts::{PI, SQRT_2};

/// Trait for hyperparameter samplers
///
/// `history` holds every finished trial with its objective value (lower is
/// better); failed trials carry `+inf`.
pub trait Sampler: Send {
    fn sample(
        &mut self,
        search_space: &SearchSpace,
        history: &[(HyperparameterConfig, f64)],
    ) -> HyperparameterConfig;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(
        &mut self,
        search_space: &SearchSpace,
        _history: &[(HyperparameterConfig, f64)],
    ) -> HyperparameterConfig {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler
///
/// History is split at the `gamma` quantile into good and bad trials. Each
/// parameter gets a Parzen estimator per set in the normalized `[0, 1]` space:
/// a mixture of Gaussians truncated to the unit interval, one per observation
/// plus a wide prior component. Candidates are drawn from the good mixture and
/// the one maximizing `l(x) / g(x)` is returned, snapped to the grid.
#[derive(Debug)]
pub struct TpeSampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TpeSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(f64::EPSILON, 1.0);
        self
    }

    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }
}

impl Sampler for TpeSampler {
    fn sample(
        &mut self,
        search_space: &SearchSpace,
        history: &[(HyperparameterConfig, f64)],
    ) -> HyperparameterConfig {
        let n_finite = history.iter().filter(|(_, v)| v.is_finite()).count();
        if history.len() < self.n_startup_trials.max(2) || n_finite == 0 {
            return search_space.sample(&mut self.rng);
        }

        let mut sorted: Vec<&(HyperparameterConfig, f64)> = history.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize)
            .clamp(1, sorted.len() - 1)
            .min(n_finite);
        let (good, bad) = sorted.split_at(n_good);

        let estimators: Vec<(ParzenEstimator, ParzenEstimator)> = search_space
            .parameters()
            .iter()
            .map(|p| {
                (
                    ParzenEstimator::fit(&observations(p, good)),
                    ParzenEstimator::fit(&observations(p, bad)),
                )
            })
            .collect();

        let mut best_point: Vec<f64> = Vec::new();
        let mut best_score = f64::NEG_INFINITY;

        for _ in 0..self.n_candidates {
            let point: Vec<f64> = estimators
                .iter()
                .map(|(l, _)| l.sample(&mut self.rng))
                .collect();
            let score: f64 = point
                .iter()
                .zip(&estimators)
                .map(|(&u, (l, g))| l.log_pdf(u) - g.log_pdf(u))
                .sum();
            if score > best_score || best_point.is_empty() {
                best_score = score;
                best_point = point;
            }
        }

        let mut config = HyperparameterConfig::new();
        for (param, u) in search_space.parameters().iter().zip(best_point) {
            config.insert(param.name.clone(), param.from_internal(u));
        }
        config
    }
}

fn observations(param: &Parameter, trials: &[&(HyperparameterConfig, f64)]) -> Vec<f64> {
    trials
        .iter()
        .filter_map(|(config, _)| config.get(&param.name))
        .map(|v| param.to_internal(&v))
        .collect()
}

/// Mixture of Gaussians truncated to `[0, 1]`
#[derive(Debug, Clone)]
struct ParzenEstimator {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
}

const PRIOR_MU: f64 = 0.5;
const PRIOR_SIGMA: f64 = 1.0;
const MIN_SIGMA: f64 = 0.01;

impl ParzenEstimator {
    /// One component per observation with a neighbour-gap bandwidth, plus the prior
    fn fit(points: &[f64]) -> Self {
        let mut sorted: Vec<f64> = points.to_vec();
        sorted.sort_by(f64::total_cmp);

        let min_sigma = (1.0 / (sorted.len() as f64 + 1.0)).min(0.1).max(MIN_SIGMA);
        let mut mus = Vec::with_capacity(sorted.len() + 1);
        let mut sigmas = Vec::with_capacity(sorted.len() + 1);

        for (i, &mu) in sorted.iter().enumerate() {
            let left = if i == 0 { mu } else { mu - sorted[i - 1] };
            let right = if i + 1 == sorted.len() { 1.0 - mu } else { sorted[i + 1] - mu };
            mus.push(mu);
            sigmas.push(left.max(right).clamp(min_sigma, 1.0));
        }

        mus.push(PRIOR_MU);
        sigmas.push(PRIOR_SIGMA);
        Self { mus, sigmas }
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        let k = rng.gen_range(0..self.mus.len());
        let (mu, sigma) = (self.mus[k], self.sigmas[k]);
        for _ in 0..64 {
            let x = mu + sigma * standard_normal(rng);
            if (0.0..=1.0).contains(&x) {
                return x;
            }
        }
        mu.clamp(0.0, 1.0)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let weight = 1.0 / self.mus.len() as f64;
        let density: f64 = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .map(|(&mu, &sigma)| {
                let z = (x - mu) / sigma;
                let mass = normal_cdf((1.0 - mu) / sigma) - normal_cdf(-mu / sigma);
                let pdf = (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt());
                weight * pdf / mass.max(1e-12)
            })
            .sum();
        density.max(1e-300).ln()
    }
}

/// Box-Muller draw from N(0, 1)
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

/// Abramowitz-Stegun 7.1.26, absolute error below 1.5e-7
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Create the sampler named by `config`
pub fn create_sampler(config: &OptimizationConfig) -> Box<dyn Sampler> {
    match config.sampler {
        SamplerType::Random => Box::new(RandomSampler::new(config.seed)),
        SamplerType::Tpe => Box::new(
            TpeSampler::new(config.seed)
                .with_n_startup(config.n_startup_trials)
                .with_gamma(config.gamma)
                .with_n_candidates(config.n_candidates),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    #[test]
    fn test_random_sampler() {
        let space = SearchSpace::boosting();
        let mut sampler = RandomSampler::new(42);
        let params = sampler.sample(&space, &[]);
        assert!(space.contains(&params));
    }

    #[test]
    fn test_tpe_is_seeded() {
        let space = SearchSpace::boosting();
        let mut a = TpeSampler::new(3);
        let mut b = TpeSampler::new(3);
        for _ in 0..5 {
            assert_eq!(a.sample(&space, &[]), b.sample(&space, &[]));
        }
    }

    #[test]
    fn test_tpe_concentrates_near_good_region() {
        let space = SearchSpace::new().int("x", 0, 100, 1);
        let history: Vec<(HyperparameterConfig, f64)> = (0..=100)
            .step_by(5)
            .map(|x| {
                let config = HyperparameterConfig::new().with("x", ParameterValue::Int(x));
                (config, ((x - 20) as f64).abs())
            })
            .collect();

        let mut sampler = TpeSampler::new(42).with_n_startup(5);
        let samples: Vec<i64> = (0..30)
            .map(|_| sampler.sample(&space, &history).get("x").unwrap().as_int())
            .collect();
        let mean = samples.iter().sum::<i64>() as f64 / samples.len() as f64;
        assert!(mean < 45.0, "mean sample {}", mean);
        assert!(samples.iter().all(|x| (0..=100).contains(x)));
    }

    #[test]
    fn test_failed_history_stays_on_grid() {
        let space = SearchSpace::boosting();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let history: Vec<(HyperparameterConfig, f64)> = (0..12)
            .map(|i| {
                let value = if i % 3 == 0 { f64::INFINITY } else { -(i as f64) / 20.0 };
                (space.sample(&mut rng), value)
            })
            .collect();

        let mut sampler = TpeSampler::new(42);
        for _ in 0..10 {
            assert!(space.contains(&sampler.sample(&space, &history)));
        }
    }

    #[test]
    fn test_parzen_density_peaks_at_observations() {
        let est = ParzenEstimator::fit(&[0.2, 0.22, 0.25]);
        assert!(est.log_pdf(0.22) > est.log_pdf(0.9));
    }

    #[test]
    fn test_erf() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
    }
}
