//! Hyperparameter search
//!
//! - Grid-aware search spaces (integer, log-uniform and discrete float ranges)
//! - Tree-structured Parzen Estimator and random samplers
//! - A fixed-budget sequential search loop that survives failed trials

mod config;
mod optimizer;
mod samplers;
mod search_space;

pub use config::{OptimizationConfig, SamplerType};
pub use optimizer::{HyperparameterSearchEngine, Study, TrialResult};
pub use samplers::{create_sampler, RandomSampler, Sampler, TpeSampler};
pub use search_space::{HyperparameterConfig, Parameter, ParameterType, ParameterValue, SearchSpace};
