//! Model training: datasets, stratified split, fit and evaluation

mod metrics;
mod sources;

pub use metrics::*;
pub use sources::*;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{EnsembleParams, Row, StandardScaler, TrainedModel, VotingEnsemble, CLASS_COUNT};
use crate::features::FeatureVector;
use crate::models::RiskLevel;

/// Fraction of samples held out for evaluation
pub const TEST_FRACTION: f64 = 0.2;

/// Seed for the train/test split
pub const SPLIT_SEED: u64 = 42;

/// Where labeled training rows come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrainingSource {
    /// Embedded hand-labeled scenarios
    Synthetic,
    /// Embedded scenarios plus recent observations labeled by rainfall
    LiveSample,
    /// Historical flood events and climate patterns
    Historical,
}

impl TrainingSource {
    /// Fewest labeled rows a fit is attempted with
    pub fn min_samples(&self) -> usize {
        match self {
            TrainingSource::Synthetic | TrainingSource::LiveSample => 5,
            TrainingSource::Historical => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingSource::Synthetic => "synthetic",
            TrainingSource::LiveSample => "live_sample",
            TrainingSource::Historical => "historical",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingError {
    #[error("Insufficient training data: {found} samples, need at least {required}")]
    InsufficientSamples { found: usize, required: usize },

    #[error("Training data contains a single class; need at least two")]
    SingleClass,

    #[error("Label {0} is out of range")]
    InvalidLabel(usize),

    #[error("Sample {0} contains a non-finite value")]
    NonFiniteSample(usize),

    #[error("Rows and labels differ in length ({rows} vs {labels})")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

/// Labeled feature rows; labels are class indices 0/1/2
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Row>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, features: FeatureVector, level: RiskLevel) {
        self.rows.push(features.to_array());
        self.labels.push(level.index());
    }

    pub fn extend(&mut self, other: Dataset) {
        self.rows.extend(other.rows);
        self.labels.extend(other.labels);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_counts(&self) -> [usize; CLASS_COUNT] {
        let mut counts = [0; CLASS_COUNT];
        for &l in &self.labels {
            if l < CLASS_COUNT {
                counts[l] += 1;
            }
        }
        counts
    }

    fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            rows: indices.iter().map(|&i| self.rows[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    fn validate(&self, min_samples: usize) -> Result<(), TrainingError> {
        if self.rows.len() != self.labels.len() {
            return Err(TrainingError::LengthMismatch {
                rows: self.rows.len(),
                labels: self.labels.len(),
            });
        }
        if self.len() < min_samples {
            return Err(TrainingError::InsufficientSamples {
                found: self.len(),
                required: min_samples,
            });
        }
        if let Some(&bad) = self.labels.iter().find(|&&l| l >= CLASS_COUNT) {
            return Err(TrainingError::InvalidLabel(bad));
        }
        if let Some(idx) = self
            .rows
            .iter()
            .position(|r| r.iter().any(|v| !v.is_finite()))
        {
            return Err(TrainingError::NonFiniteSample(idx));
        }
        if self.class_counts().iter().filter(|&&c| c > 0).count() < 2 {
            return Err(TrainingError::SingleClass);
        }
        Ok(())
    }
}

/// Split preserving class proportions. Every class keeps at least one
/// training sample; at least one sample is held out when possible.
pub fn stratified_split(data: &Dataset, test_fraction: f64, seed: u64) -> (Dataset, Dataset) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); CLASS_COUNT];
    for (i, &l) in data.labels.iter().enumerate() {
        if l < CLASS_COUNT {
            by_class[l].push(i);
        }
    }

    let mut quotas: Vec<usize> = by_class
        .iter()
        .map(|members| {
            let wanted = (members.len() as f64 * test_fraction).round() as usize;
            wanted.min(members.len().saturating_sub(1))
        })
        .collect();

    if quotas.iter().sum::<usize>() == 0 {
        let largest = (0..CLASS_COUNT).max_by_key(|&c| by_class[c].len());
        if let Some(c) = largest {
            if by_class[c].len() >= 2 {
                quotas[c] = 1;
            }
        }
    }

    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();
    for (members, quota) in by_class.iter_mut().zip(quotas) {
        members.shuffle(&mut rng);
        let (test, train) = members.split_at(quota);
        test_idx.extend_from_slice(test);
        train_idx.extend_from_slice(train);
    }
    train_idx.sort_unstable();
    test_idx.sort_unstable();

    (data.subset(&train_idx), data.subset(&test_idx))
}

/// A fitted model and how it scored on held-out data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model: TrainedModel,
    pub metrics: EvaluationMetrics,
    pub train_samples: usize,
    pub test_samples: usize,
    pub class_distribution: [usize; CLASS_COUNT],
}

/// Fit a scaler and ensemble on a stratified train split and evaluate on the rest
pub fn train(
    data: &Dataset,
    params: &EnsembleParams,
    min_samples: usize,
) -> Result<TrainingReport, TrainingError> {
    data.validate(min_samples)?;

    let (train_set, test_set) = stratified_split(data, TEST_FRACTION, SPLIT_SEED);

    let scaler = StandardScaler::fit(&train_set.rows);
    let train_rows = scaler
        .transform_all(&train_set.rows)
        .map_err(|e| TrainingError::Evaluation(e.to_string()))?;
    let ensemble = VotingEnsemble::fit(&train_rows, &train_set.labels, params);

    let (eval_rows, eval_labels) = if test_set.is_empty() {
        (train_rows.clone(), train_set.labels.clone())
    } else {
        let rows = scaler
            .transform_all(&test_set.rows)
            .map_err(|e| TrainingError::Evaluation(e.to_string()))?;
        (rows, test_set.labels.clone())
    };
    let predicted = ensemble
        .predict_labels(&eval_rows)
        .map_err(|e| TrainingError::Evaluation(e.to_string()))?;
    let metrics = EvaluationMetrics::compute(&eval_labels, &predicted);

    Ok(TrainingReport {
        model: TrainedModel { scaler, ensemble },
        metrics,
        train_samples: train_set.len(),
        test_samples: test_set.len(),
        class_distribution: data.class_counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(counts: [usize; CLASS_COUNT]) -> Dataset {
        let mut d = Dataset::new();
        for (class, &n) in counts.iter().enumerate() {
            for i in 0..n {
                let mut row = [0.0; crate::features::FEATURE_COUNT];
                row[0] = (class * 100 + i) as f64;
                d.rows.push(row);
                d.labels.push(class);
            }
        }
        d
    }

    #[test]
    fn test_split_preserves_every_class_in_train() {
        let data = dataset([5, 6, 1]);
        let (train, test) = stratified_split(&data, TEST_FRACTION, SPLIT_SEED);
        assert_eq!(train.len() + test.len(), data.len());
        assert!(train.class_counts().iter().all(|&c| c > 0));
        assert_eq!(test.class_counts()[2], 0);
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = dataset([10, 10, 10]);
        assert_eq!(
            stratified_split(&data, TEST_FRACTION, 7),
            stratified_split(&data, TEST_FRACTION, 7)
        );
    }

    #[test]
    fn test_single_class_rejected() {
        let data = dataset([12, 0, 0]);
        let err = train(&data, &EnsembleParams::default(), 5).unwrap_err();
        assert_eq!(err, TrainingError::SingleClass);
    }
}
