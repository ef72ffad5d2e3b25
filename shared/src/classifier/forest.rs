//! Bagged ensemble of classification trees

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{ClassifierError, DecisionTree, Row, TreeParams, CLASS_COUNT};
use crate::features::FEATURE_COUNT;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Reweight classes inversely to their frequency
    pub balanced_class_weight: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            balanced_class_weight: true,
            seed: 42,
        }
    }
}

/// Random forest: bootstrap samples, sqrt(feature count) features per split
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(rows: &[Row], labels: &[usize], params: &ForestParams) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let weights = if params.balanced_class_weight {
            balanced_weights(labels)
        } else {
            vec![1.0; labels.len()]
        };

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(((FEATURE_COUNT as f64).sqrt() as usize).max(1)),
        };

        let n = rows.len();
        if n == 0 {
            return Self { trees: Vec::new() };
        }
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.gen());
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                DecisionTree::fit_classifier(
                    rows,
                    labels,
                    &weights,
                    &bootstrap,
                    tree_params,
                    &mut tree_rng,
                )
            })
            .collect();

        Self { trees }
    }

    /// Mean of per-tree leaf distributions
    pub fn predict_proba(&self, row: &Row) -> Result<[f64; CLASS_COUNT], ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::EmptyModel);
        }
        let mut total = [0.0; CLASS_COUNT];
        for tree in &self.trees {
            let leaf = tree.predict(row).ok_or(ClassifierError::EmptyModel)?;
            if leaf.len() != CLASS_COUNT {
                return Err(ClassifierError::DimensionMismatch {
                    expected: CLASS_COUNT,
                    actual: leaf.len(),
                });
            }
            for (t, p) in total.iter_mut().zip(leaf) {
                *t += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(total.map(|t| t / n))
    }
}

/// `n_samples / (n_classes_present * class_count)` per sample
pub fn balanced_weights(labels: &[usize]) -> Vec<f64> {
    let mut counts = [0usize; CLASS_COUNT];
    for &l in labels {
        counts[l] += 1;
    }
    let present = counts.iter().filter(|&&c| c > 0).count().max(1) as f64;
    let n = labels.len() as f64;
    labels
        .iter()
        .map(|&l| n / (present * counts[l] as f64))
        .collect()
}
