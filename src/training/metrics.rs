//! Classification metrics for binary decisions

use serde::{Deserialize, Serialize};

/// Confusion counts of the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    /// Count outcomes; values >= 0.5 are positive
    pub fn from_labels<'a>(
        y_true: impl IntoIterator<Item = &'a f64>,
        y_pred: impl IntoIterator<Item = &'a f64>,
    ) -> Self {
        let mut counts = Self::default();
        for (t, p) in y_true.into_iter().zip(y_pred) {
            match (*t >= 0.5, *p >= 0.5) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Metrics for a binary classifier on one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Precision of the positive class
    pub precision: f64,
    /// Recall of the positive class
    pub recall: f64,
    /// F1 of the positive class
    pub f1_score: f64,
    /// F1 micro-averaged over both classes
    pub micro_f1: f64,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        let c = ConfusionCounts::from_labels(y_true, y_pred);
        let n = c.total();

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(c.tp, c.tp + c.fp);
        let recall = ratio(c.tp, c.tp + c.fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(c.tp + c.tn, n),
            precision,
            recall,
            f1_score,
            micro_f1: micro_f1(&c),
            n_samples: n,
        }
    }
}

/// Micro-averaged F1 over both classes.
///
/// Pooled true positives are the correct decisions of either class and every
/// error counts once as a false positive and once as a false negative.
pub fn micro_f1(c: &ConfusionCounts) -> f64 {
    let tp = (c.tp + c.tn) as f64;
    let errors = (c.fp + c.fn_) as f64;
    let denom = 2.0 * tp + 2.0 * errors;
    if denom == 0.0 {
        0.0
    } else {
        2.0 * tp / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_counts() {
        let y_true = [1.0, 1.0, 0.0, 0.0, 1.0];
        let y_pred = [1.0, 0.0, 0.0, 1.0, 1.0];
        let c = ConfusionCounts::from_labels(&y_true, &y_pred);
        assert_eq!(c, ConfusionCounts { tp: 2, fp: 1, tn: 1, fn_: 1 });
    }

    #[test]
    fn test_micro_f1_equals_accuracy() {
        let y_true = [1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = [1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let m = ClassificationMetrics::compute(&y_true, &y_pred);
        assert!((m.micro_f1 - m.accuracy).abs() < 1e-12);
        assert!((m.accuracy - 5.0 / 7.0).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_partition() {
        let m = ClassificationMetrics::compute(&[], &[]);
        assert_eq!(m.micro_f1, 0.0);
        assert_eq!(m.n_samples, 0);
    }
}
