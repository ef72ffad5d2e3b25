use serde::{Deserialize, Serialize};

use crate::classifier::CLASS_COUNT;

/// Held-out evaluation of a fitted model.
///
/// Precision, recall and F1 are support-weighted averages over the classes;
/// a class with no predicted samples contributes a precision of 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: [usize; CLASS_COUNT],
    /// `confusion[actual][predicted]`
    pub confusion: [[usize; CLASS_COUNT]; CLASS_COUNT],
}

impl EvaluationMetrics {
    pub fn compute(actual: &[usize], predicted: &[usize]) -> Self {
        let mut confusion = [[0usize; CLASS_COUNT]; CLASS_COUNT];
        for (&a, &p) in actual.iter().zip(predicted) {
            if a < CLASS_COUNT && p < CLASS_COUNT {
                confusion[a][p] += 1;
            }
        }

        let total: usize = confusion.iter().flatten().sum();
        if total == 0 {
            return Self::default();
        }

        let mut support = [0usize; CLASS_COUNT];
        let mut correct = 0;
        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);

        for k in 0..CLASS_COUNT {
            let tp = confusion[k][k];
            let row: usize = confusion[k].iter().sum();
            let col: usize = (0..CLASS_COUNT).map(|a| confusion[a][k]).sum();
            support[k] = row;
            correct += tp;

            let p = ratio(tp, col);
            let r = ratio(tp, row);
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

            let weight = row as f64 / total as f64;
            precision += weight * p;
            recall += weight * r;
            f1 += weight * f;
        }

        Self {
            accuracy: correct as f64 / total as f64,
            precision,
            recall,
            f1,
            support,
            confusion,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let labels = [0, 1, 2, 2, 1];
        let m = EvaluationMetrics::compute(&labels, &labels);
        assert_eq!(m.accuracy, 1.0);
        assert!((m.f1 - 1.0).abs() < 1e-12);
        assert_eq!(m.support, [1, 2, 2]);
    }

    #[test]
    fn test_unpredicted_class_counts_as_zero_precision() {
        let m = EvaluationMetrics::compute(&[0, 0, 1, 1], &[0, 0, 0, 0]);
        assert!((m.accuracy - 0.5).abs() < 1e-12);
        // class 0: p = 0.5, class 1: p = 0 (no predictions)
        assert!((m.precision - 0.25).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(EvaluationMetrics::compute(&[], &[]), EvaluationMetrics::default());
    }
}
