//! CART decision trees
//!
//! One growing routine serves both tree kinds used by the ensemble:
//! weighted-gini classification trees for the random forest and squared-error
//! regression trees (with Newton leaf values) for gradient boosting.

use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{Row, CLASS_COUNT};
use crate::features::FEATURE_COUNT;

const LOSS_EPSILON: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all of them
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

/// A fitted tree stored as a flat node arena rooted at index 0
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Fit a classification tree on `samples` (indices into `rows`, repeats allowed)
    pub fn fit_classifier(
        rows: &[Row],
        labels: &[usize],
        weights: &[f64],
        samples: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let target = ClassTarget { labels, weights };
        Grower::new(rows, &target, params).run(samples, rng)
    }

    /// Fit a regression tree on boosting residuals.
    ///
    /// Leaves hold `leaf_scale * sum(residual) / sum(hessian)`.
    pub fn fit_regressor(
        rows: &[Row],
        residuals: &[f64],
        hessians: &[f64],
        leaf_scale: f64,
        samples: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let target = RegressionTarget {
            residuals,
            hessians,
            leaf_scale,
        };
        Grower::new(rows, &target, params).run(samples, rng)
    }

    /// Leaf value reached by `row`, or `None` for a malformed tree
    pub fn predict(&self, row: &Row) -> Option<&[f64]> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx)? {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature)?;
                    idx = if *value <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return Some(value),
            }
        }
        None
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// What a tree is fitted against
trait SplitTarget {
    type Acc: Clone;

    fn empty(&self) -> Self::Acc;
    fn push(&self, acc: &mut Self::Acc, sample: usize);
    fn pop(&self, acc: &mut Self::Acc, sample: usize);
    /// Total (not mean) impurity of the accumulated samples
    fn loss(&self, acc: &Self::Acc) -> f64;
    fn leaf_value(&self, samples: &[usize]) -> Vec<f64>;
}

struct ClassTarget<'a> {
    labels: &'a [usize],
    weights: &'a [f64],
}

impl SplitTarget for ClassTarget<'_> {
    type Acc = [f64; CLASS_COUNT];

    fn empty(&self) -> Self::Acc {
        [0.0; CLASS_COUNT]
    }

    fn push(&self, acc: &mut Self::Acc, sample: usize) {
        acc[self.labels[sample]] += self.weights[sample];
    }

    fn pop(&self, acc: &mut Self::Acc, sample: usize) {
        acc[self.labels[sample]] -= self.weights[sample];
    }

    fn loss(&self, acc: &Self::Acc) -> f64 {
        let total: f64 = acc.iter().sum();
        if total <= LOSS_EPSILON {
            return 0.0;
        }
        // weight * gini
        total - acc.iter().map(|c| c * c).sum::<f64>() / total
    }

    fn leaf_value(&self, samples: &[usize]) -> Vec<f64> {
        let mut acc = self.empty();
        for &s in samples {
            self.push(&mut acc, s);
        }
        let total: f64 = acc.iter().sum();
        if total <= LOSS_EPSILON {
            return vec![1.0 / CLASS_COUNT as f64; CLASS_COUNT];
        }
        acc.iter().map(|c| c / total).collect()
    }
}

struct RegressionTarget<'a> {
    residuals: &'a [f64],
    hessians: &'a [f64],
    leaf_scale: f64,
}

#[derive(Clone)]
struct MomentAcc {
    sum: f64,
    sum_sq: f64,
    count: f64,
}

impl SplitTarget for RegressionTarget<'_> {
    type Acc = MomentAcc;

    fn empty(&self) -> Self::Acc {
        MomentAcc {
            sum: 0.0,
            sum_sq: 0.0,
            count: 0.0,
        }
    }

    fn push(&self, acc: &mut Self::Acc, sample: usize) {
        let r = self.residuals[sample];
        acc.sum += r;
        acc.sum_sq += r * r;
        acc.count += 1.0;
    }

    fn pop(&self, acc: &mut Self::Acc, sample: usize) {
        let r = self.residuals[sample];
        acc.sum -= r;
        acc.sum_sq -= r * r;
        acc.count -= 1.0;
    }

    fn loss(&self, acc: &Self::Acc) -> f64 {
        if acc.count <= 0.0 {
            return 0.0;
        }
        (acc.sum_sq - acc.sum * acc.sum / acc.count).max(0.0)
    }

    fn leaf_value(&self, samples: &[usize]) -> Vec<f64> {
        let numerator: f64 = samples.iter().map(|&s| self.residuals[s]).sum();
        let denominator: f64 = samples.iter().map(|&s| self.hessians[s]).sum();
        if denominator.abs() <= LOSS_EPSILON {
            return vec![0.0];
        }
        vec![self.leaf_scale * numerator / denominator]
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Grower<'a, T: SplitTarget> {
    rows: &'a [Row],
    target: &'a T,
    params: TreeParams,
    nodes: Vec<Node>,
}

impl<'a, T: SplitTarget> Grower<'a, T> {
    fn new(rows: &'a [Row], target: &'a T, params: TreeParams) -> Self {
        Self {
            rows,
            target,
            params,
            nodes: Vec::new(),
        }
    }

    fn run(mut self, samples: &[usize], rng: &mut ChaCha8Rng) -> DecisionTree {
        let mut working = samples.to_vec();
        self.grow(&mut working, 0, rng);
        DecisionTree { nodes: self.nodes }
    }

    fn grow(&mut self, samples: &mut [usize], depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: Vec::new() });

        let mut acc = self.target.empty();
        for &s in samples.iter() {
            self.target.push(&mut acc, s);
        }
        let parent_loss = self.target.loss(&acc);

        let min_leaf = self.params.min_samples_leaf.max(1);
        let splittable = depth < self.params.max_depth
            && samples.len() >= self.params.min_samples_split.max(2)
            && samples.len() >= 2 * min_leaf
            && parent_loss > LOSS_EPSILON;

        let best = if splittable {
            self.best_split(samples, parent_loss, rng)
        } else {
            None
        };

        match best {
            Some(split) => {
                let rows = self.rows;
                let mid = partition_in_place(samples, |s| {
                    rows[s][split.feature] <= split.threshold
                });
                let (left_samples, right_samples) = samples.split_at_mut(mid);
                let left = self.grow(left_samples, depth + 1, rng);
                let right = self.grow(right_samples, depth + 1, rng);
                self.nodes[id] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
            }
            None => {
                self.nodes[id] = Node::Leaf {
                    value: self.target.leaf_value(samples),
                };
            }
        }

        id
    }

    fn best_split(
        &self,
        samples: &[usize],
        parent_loss: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let features: Vec<usize> = match self.params.max_features {
            Some(k) if k < FEATURE_COUNT => sample(rng, FEATURE_COUNT, k.max(1)).into_vec(),
            _ => (0..FEATURE_COUNT).collect(),
        };
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order = samples.to_vec();

        for feature in features {
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut left = self.target.empty();
            let mut right = self.target.empty();
            for &s in &order {
                self.target.push(&mut right, s);
            }

            for i in 0..order.len() - 1 {
                let s = order[i];
                self.target.push(&mut left, s);
                self.target.pop(&mut right, s);

                let n_left = i + 1;
                let n_right = order.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let value = self.rows[s][feature];
                let next = self.rows[order[i + 1]][feature];
                if next <= value {
                    continue;
                }

                let gain = parent_loss - self.target.loss(&left) - self.target.loss(&right);
                if gain > LOSS_EPSILON && best.map_or(true, |b| gain > b.gain) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Move samples satisfying `goes_left` to the front; returns their count
fn partition_in_place(samples: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..samples.len() {
        if goes_left(samples[i]) {
            samples.swap(i, mid);
            mid += 1;
        }
    }
    mid
}
