//! Stratified k-fold assignment

use crate::dataset::{CandidateId, Dataset};
use crate::error::{PerfError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split, as record indices into the dataset
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Mapping of every candidate to exactly one of `k` folds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldAssignment {
    k: usize,
    folds: BTreeMap<CandidateId, usize>,
}

impl FoldAssignment {
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn fold_of(&self, id: &CandidateId) -> Option<usize> {
        self.folds.get(id).copied()
    }

    /// Number of candidates per fold
    pub fn fold_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &fold in self.folds.values() {
            sizes[fold] += 1;
        }
        sizes
    }

    /// Train/test index splits of `dataset`, one per fold in fold order.
    ///
    /// Every record of the dataset must have been assigned.
    pub fn splits(&self, dataset: &Dataset) -> Result<Vec<CVSplit>> {
        let mut splits: Vec<CVSplit> = (0..self.k)
            .map(|fold_idx| CVSplit {
                train_indices: Vec::new(),
                test_indices: Vec::new(),
                fold_idx,
            })
            .collect();

        for (idx, record) in dataset.records().iter().enumerate() {
            let fold = self.fold_of(record.id()).ok_or_else(|| {
                PerfError::DataError(format!("candidate {} has no fold", record.id()))
            })?;
            for split in splits.iter_mut() {
                if split.fold_idx == fold {
                    split.test_indices.push(idx);
                } else {
                    split.train_indices.push(idx);
                }
            }
        }

        Ok(splits)
    }
}

/// Stratified k-fold splitter
///
/// Records are grouped by label. Within a stratum they are ordered by
/// candidate id, shuffled with a seeded ChaCha8 generator and dealt
/// round-robin over the folds. The deal continues across strata, so fold
/// sizes differ by at most one and the assignment does not depend on input
/// row order.
#[derive(Debug, Clone)]
pub struct CrossValidationSplitter {
    n_folds: usize,
    seed: u64,
}

impl CrossValidationSplitter {
    pub fn new(n_folds: usize) -> Self {
        Self { n_folds, seed: 42 }
    }

    /// Set random state for reproducibility
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn split(&self, dataset: &Dataset) -> Result<FoldAssignment> {
        let k = self.n_folds;
        if k < 2 {
            return Err(PerfError::invalid_parameter(
                "n_folds",
                k,
                "at least 2 folds are required",
            ));
        }

        let mut strata: BTreeMap<bool, Vec<CandidateId>> = BTreeMap::new();
        for record in dataset.records() {
            let label = record.label.ok_or_else(|| {
                PerfError::InsufficientData(format!("record {} has no label", record.id()))
            })?;
            strata.entry(label).or_default().push(record.id().clone());
        }

        for label in [false, true] {
            let n = strata.get(&label).map_or(0, Vec::len);
            if n < k {
                return Err(PerfError::InsufficientData(format!(
                    "label {} has {} records, fewer than {} folds",
                    u8::from(label),
                    n,
                    k
                )));
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds = BTreeMap::new();
        let mut next_fold = 0;

        for members in strata.values_mut() {
            members.sort();
            members.shuffle(&mut rng);
            for id in members.drain(..) {
                folds.insert(id, next_fold);
                next_fold = (next_fold + 1) % k;
            }
        }

        tracing::debug!(k, n_records = folds.len(), seed = self.seed, "Folds assigned");
        Ok(FoldAssignment { k, folds })
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FeatureVector, Record};

    fn dataset(n_pos: usize, n_neg: usize) -> Dataset {
        let records = (0..n_pos + n_neg)
            .map(|i| Record {
                features: FeatureVector::new(CandidateId::new(format!("c{:03}", i)), vec![i as f64]),
                label: Some(i < n_pos),
            })
            .collect();
        Dataset::new(vec!["x".into()], records).unwrap()
    }

    #[test]
    fn test_every_record_in_one_fold() {
        let ds = dataset(60, 40);
        let folds = CrossValidationSplitter::new(5).split(&ds).unwrap();

        assert_eq!(folds.len(), 100);
        let splits = folds.splits(&ds).unwrap();
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.test_indices.len() + split.train_indices.len(), 100);
        }
    }

    #[test]
    fn test_folds_keep_label_ratio() {
        let ds = dataset(60, 40);
        let folds = CrossValidationSplitter::new(5).split(&ds).unwrap();
        let splits = folds.splits(&ds).unwrap();

        assert_eq!(folds.fold_sizes(), vec![20; 5]);
        for split in &splits {
            let positives = split
                .test_indices
                .iter()
                .filter(|&&i| ds.records()[i].label == Some(true))
                .count();
            assert!((11..=13).contains(&positives), "fold has {} positives", positives);
        }
    }

    #[test]
    fn test_fold_sizes_differ_by_at_most_one() {
        let ds = dataset(13, 9);
        let sizes = CrossValidationSplitter::new(4).split(&ds).unwrap().fold_sizes();
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1, "sizes {:?}", sizes);
    }

    #[test]
    fn test_label_ratio_within_one_over_k() {
        let cases = [
            (60, 40, 5),
            (7, 23, 7),
            (50, 51, 10),
            (13, 9, 4),
            (20, 80, 3),
            (33, 17, 6),
            (100, 7, 7),
            (12, 12, 2),
            (45, 30, 8),
        ];
        for (n_pos, n_neg, k) in cases {
            let ds = dataset(n_pos, n_neg);
            let n = n_pos + n_neg;
            let folds = CrossValidationSplitter::new(k).split(&ds).unwrap();
            let splits = folds.splits(&ds).unwrap();

            let mut seen = vec![0usize; n];
            for split in &splits {
                for &i in &split.test_indices {
                    seen[i] += 1;
                }
            }
            assert!(seen.iter().all(|&c| c == 1), "{}/{} k={}: record in several folds", n_pos, n_neg, k);

            let global = n_pos as f64 / n as f64;
            for split in &splits {
                let fold_pos = split
                    .test_indices
                    .iter()
                    .filter(|&&i| ds.records()[i].label == Some(true))
                    .count();
                let ratio = fold_pos as f64 / split.test_indices.len() as f64;
                assert!(
                    (ratio - global).abs() <= 1.0 / k as f64 + 1e-12,
                    "{}/{} k={}: fold {} ratio {} vs {}",
                    n_pos,
                    n_neg,
                    k,
                    split.fold_idx,
                    ratio,
                    global
                );
            }
        }
    }

    #[test]
    fn test_independent_of_row_order() {
        let ds = dataset(30, 20);
        let mut reversed: Vec<Record> = ds.records().to_vec();
        reversed.reverse();
        let ds_rev = Dataset::new(ds.feature_names().to_vec(), reversed).unwrap();

        let splitter = CrossValidationSplitter::new(5).with_seed(7);
        assert_eq!(splitter.split(&ds).unwrap(), splitter.split(&ds_rev).unwrap());
    }

    #[test]
    fn test_seed_changes_assignment() {
        let ds = dataset(30, 20);
        let a = CrossValidationSplitter::new(5).with_seed(1).split(&ds).unwrap();
        let b = CrossValidationSplitter::new(5).with_seed(2).split(&ds).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_small_stratum_rejected() {
        let ds = dataset(3, 20);
        assert!(matches!(
            CrossValidationSplitter::new(5).split(&ds),
            Err(PerfError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_single_fold_rejected() {
        let ds = dataset(10, 10);
        assert!(matches!(
            CrossValidationSplitter::new(1).split(&ds),
            Err(PerfError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.5, 0.7]);
        assert!((results.mean_score - 0.6).abs() < 1e-12);
        assert!((results.std_score - 0.1).abs() < 1e-12);
    }
}
