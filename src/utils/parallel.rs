//! Worker pool for fold-level parallelism

use crate::error::{PerfError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { n_threads: None }
    }
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads).max(1)
    }

    /// Build a dedicated pool sized by this configuration
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .thread_name(|i| format!("perfscore-fold-{}", i))
            .build()
            .map_err(|e| PerfError::TrainingError(format!("cannot build worker pool: {}", e)))
    }
}

/// Run `f` over `items` on `pool`; output order matches input order
pub fn parallel_map<T, U, F>(pool: &rayon::ThreadPool, items: Vec<T>, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Send + Sync,
{
    pool.install(|| items.into_par_iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_map_preserves_order() {
        let pool = ParallelConfig::new().with_threads(4).build_pool().unwrap();
        let items: Vec<i32> = (0..1000).collect();
        let results = parallel_map(&pool, items, |x| x * 2);

        assert_eq!(results.len(), 1000);
        assert_eq!(results[0], 0);
        assert_eq!(results[500], 1000);
    }

    #[test]
    fn test_parallel_config() {
        let config = ParallelConfig::new().with_threads(3);
        assert_eq!(config.n_threads, Some(3));
        assert_eq!(config.num_threads(), 3);
        assert_eq!(ParallelConfig::new().with_threads(0).num_threads(), 1);
    }
}
