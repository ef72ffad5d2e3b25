//! Risk prediction models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::FeatureVector;
use crate::models::RiskLevel;

/// How long a prediction stays authoritative after it is made
pub fn prediction_validity() -> Duration {
    Duration::hours(2)
}

/// Three-way class distribution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskProbabilities {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl RiskProbabilities {
    pub fn from_array(p: [f64; 3]) -> Self {
        Self {
            low: p[0],
            medium: p[1],
            high: p[2],
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.low, self.medium, self.high]
    }

    pub fn get(&self, level: RiskLevel) -> f64 {
        self.to_array()[level.index()]
    }

    pub fn sum(&self) -> f64 {
        self.low + self.medium + self.high
    }

    /// Most probable level; ties go to the more severe level
    pub fn argmax(&self) -> RiskLevel {
        let p = self.to_array();
        let mut best = 0;
        for i in 1..p.len() {
            if p[i] >= p[best] {
                best = i;
            }
        }
        RiskLevel::ALL[best]
    }

    pub fn max(&self) -> f64 {
        self.low.max(self.medium).max(self.high)
    }
}

/// Which classifier produced a prediction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    Trained,
    Baseline,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::Trained => "trained",
            PredictionMethod::Baseline => "baseline",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "trained" => PredictionMethod::Trained,
            _ => PredictionMethod::Baseline,
        }
    }
}

/// Output of a single classifier invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub level: RiskLevel,
    pub confidence: f64,
    pub probabilities: RiskProbabilities,
    pub method: PredictionMethod,
    /// Baseline risk score; absent for trained predictions
    pub score: Option<f64>,
}

/// A persisted classifier result, immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskPrediction {
    pub id: Uuid,
    pub ward_id: Uuid,
    pub predicted_level: RiskLevel,
    pub confidence: f64,
    pub probabilities: RiskProbabilities,
    pub features_used: FeatureVector,
    pub model_version: String,
    pub method: PredictionMethod,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RiskPrediction {
    pub fn new(
        ward_id: Uuid,
        classification: &Classification,
        features: FeatureVector,
        model_version: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ward_id,
            predicted_level: classification.level,
            confidence: classification.confidence,
            probabilities: classification.probabilities,
            features_used: features,
            model_version: model_version.into(),
            method: classification.method,
            valid_from: now,
            valid_until: now + prediction_validity(),
            created_at: now,
        }
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.valid_from && at < self.valid_until
    }
}
