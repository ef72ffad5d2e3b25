//! Soft-voting ensemble and the trained-mode classifier

use serde::{Deserialize, Serialize};

use super::{
    BoostingParams, ClassifierError, ForestParams, GradientBoosting, RandomForest, Row,
    StandardScaler, CLASS_COUNT,
};
use crate::features::{FeatureVector, FEATURE_NAMES};
use crate::models::{Classification, PredictionMethod, RiskProbabilities};

const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Hyperparameters for the full ensemble
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EnsembleParams {
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    /// Voting weights for (forest, boosting)
    pub weights: [f64; 2],
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            weights: [0.5, 0.5],
        }
    }
}

/// Averages class probabilities of a random forest and a boosted ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VotingEnsemble {
    forest: RandomForest,
    boosting: GradientBoosting,
    weights: [f64; 2],
}

impl VotingEnsemble {
    pub fn fit(rows: &[Row], labels: &[usize], params: &EnsembleParams) -> Self {
        Self {
            forest: RandomForest::fit(rows, labels, &params.forest),
            boosting: GradientBoosting::fit(rows, labels, &params.boosting),
            weights: params.weights,
        }
    }

    pub fn predict_proba(&self, row: &Row) -> Result<[f64; CLASS_COUNT], ClassifierError> {
        let forest = self.forest.predict_proba(row)?;
        let boosting = self.boosting.predict_proba(row)?;
        let total_weight = self.weights[0] + self.weights[1];
        if total_weight.is_nan() || total_weight <= 0.0 {
            return Err(ClassifierError::EmptyModel);
        }

        let mut p = [0.0; CLASS_COUNT];
        for k in 0..CLASS_COUNT {
            p[k] = (self.weights[0] * forest[k] + self.weights[1] * boosting[k]) / total_weight;
        }

        let sum: f64 = p.iter().sum();
        if !sum.is_finite() || (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
            return Err(ClassifierError::InvalidDistribution(p));
        }
        Ok(p)
    }

    /// Most probable class index for each row
    pub fn predict_labels(&self, rows: &[Row]) -> Result<Vec<usize>, ClassifierError> {
        rows.iter()
            .map(|r| {
                self.predict_proba(r)
                    .map(|p| RiskProbabilities::from_array(p).argmax().index())
            })
            .collect()
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn boosting(&self) -> &GradientBoosting {
        &self.boosting
    }
}

/// A fitted scaler plus ensemble, ready for inference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub ensemble: VotingEnsemble,
}

impl TrainedModel {
    pub fn classify(&self, features: &FeatureVector) -> Result<Classification, ClassifierError> {
        let raw = features.to_array();
        if let Some(idx) = raw.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFiniteFeature(FEATURE_NAMES[idx]));
        }

        let scaled = self.scaler.transform(&raw)?;
        if let Some(idx) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::OutOfRange(FEATURE_NAMES[idx]));
        }
        let probabilities = RiskProbabilities::from_array(self.ensemble.predict_proba(&scaled)?);

        Ok(Classification {
            level: probabilities.argmax(),
            confidence: probabilities.max(),
            probabilities,
            method: PredictionMethod::Trained,
            score: None,
        })
    }
}
