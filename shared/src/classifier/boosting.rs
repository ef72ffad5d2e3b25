//! Multi-class gradient boosting with softmax deviance

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{ClassifierError, DecisionTree, Row, TreeParams, CLASS_COUNT};

const MIN_PRIOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) per stage
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

/// One regression tree per class per stage, added to log-prior raw scores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientBoosting {
    init: [f64; CLASS_COUNT],
    learning_rate: f64,
    stages: Vec<Vec<DecisionTree>>,
}

impl GradientBoosting {
    pub fn fit(rows: &[Row], labels: &[usize], params: &BoostingParams) -> Self {
        let n = rows.len();
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        let mut counts = [0.0; CLASS_COUNT];
        for &l in labels {
            counts[l] += 1.0;
        }
        let init = counts.map(|c| (c / n.max(1) as f64).max(MIN_PRIOR).ln());

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };
        let leaf_scale = (CLASS_COUNT as f64 - 1.0) / CLASS_COUNT as f64;
        let stage_size = ((n as f64 * params.subsample.clamp(0.0, 1.0)).round() as usize)
            .max(1)
            .min(n);

        let mut raw: Vec<[f64; CLASS_COUNT]> = vec![init; n];
        let mut stages = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let probs: Vec<[f64; CLASS_COUNT]> = raw.iter().map(softmax).collect();
            let drawn: Vec<usize> = if stage_size < n {
                sample(&mut rng, n, stage_size).into_vec()
            } else {
                (0..n).collect()
            };

            let mut stage = Vec::with_capacity(CLASS_COUNT);
            for k in 0..CLASS_COUNT {
                let residuals: Vec<f64> = (0..n)
                    .map(|i| indicator(labels[i] == k) - probs[i][k])
                    .collect();
                let hessians: Vec<f64> = (0..n).map(|i| probs[i][k] * (1.0 - probs[i][k])).collect();

                let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.gen());
                let tree = DecisionTree::fit_regressor(
                    rows,
                    &residuals,
                    &hessians,
                    leaf_scale,
                    &drawn,
                    tree_params,
                    &mut tree_rng,
                );

                for (i, row) in rows.iter().enumerate() {
                    if let Some(step) = tree.predict(row).and_then(|v| v.first()) {
                        raw[i][k] += params.learning_rate * step;
                    }
                }
                stage.push(tree);
            }
            stages.push(stage);
        }

        Self {
            init,
            learning_rate: params.learning_rate,
            stages,
        }
    }

    pub fn predict_proba(&self, row: &Row) -> Result<[f64; CLASS_COUNT], ClassifierError> {
        let mut raw = self.init;
        for stage in &self.stages {
            if stage.len() != CLASS_COUNT {
                return Err(ClassifierError::DimensionMismatch {
                    expected: CLASS_COUNT,
                    actual: stage.len(),
                });
            }
            for (k, tree) in stage.iter().enumerate() {
                let step = tree
                    .predict(row)
                    .and_then(|v| v.first().copied())
                    .ok_or(ClassifierError::EmptyModel)?;
                raw[k] += self.learning_rate * step;
            }
        }
        Ok(softmax(&raw))
    }
}

fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn softmax(raw: &[f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = raw.map(|r| (r - max).exp());
    let total: f64 = exp.iter().sum();
    exp.map(|e| e / total)
}
