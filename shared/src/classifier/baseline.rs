//! Rule-based fallback classifier

use serde::{Deserialize, Serialize};

use crate::features::{FallbackProfile, FeatureVector};
use crate::models::{Classification, PredictionMethod, RiskLevel, RiskProbabilities};

/// Score at or above which a ward is High risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Score at or above which a ward is Medium risk
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

/// Weights and normalizers of the linear baseline score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BaselineParams {
    pub rainfall_weight: f64,
    pub rainfall_divisor: f64,
    pub reports_weight: f64,
    pub reports_divisor: f64,
    /// Reported confidence; the baseline has no real distribution
    pub confidence: f64,
}

impl BaselineParams {
    pub fn for_profile(profile: FallbackProfile) -> Self {
        match profile {
            FallbackProfile::Baseline => Self {
                rainfall_weight: 0.6,
                rainfall_divisor: 50.0,
                reports_weight: 0.4,
                reports_divisor: 10.0,
                confidence: 0.5,
            },
            FallbackProfile::Advanced => Self {
                rainfall_weight: 0.7,
                rainfall_divisor: 100.0,
                reports_weight: 0.3,
                reports_divisor: 15.0,
                confidence: 0.75,
            },
        }
    }
}

/// Deterministic linear risk scorer
#[derive(Debug, Clone, Copy)]
pub struct BaselineClassifier {
    params: BaselineParams,
}

impl BaselineClassifier {
    pub fn new(params: BaselineParams) -> Self {
        Self { params }
    }

    pub fn for_profile(profile: FallbackProfile) -> Self {
        Self::new(BaselineParams::for_profile(profile))
    }

    pub fn params(&self) -> &BaselineParams {
        &self.params
    }

    /// Risk score clamped to [0, 1]
    pub fn score(&self, features: &FeatureVector) -> f64 {
        let p = &self.params;
        let raw = p.rainfall_weight * features.rainfall_24h_avg / p.rainfall_divisor
            + p.reports_weight * features.validated_reports_7d / p.reports_divisor;
        if raw.is_nan() {
            return 0.0;
        }
        raw.clamp(0.0, 1.0)
    }

    pub fn classify(&self, features: &FeatureVector) -> Classification {
        let score = self.score(features);
        Classification {
            level: level_for_score(score),
            confidence: self.params.confidence,
            probabilities: synthetic_probabilities(score),
            method: PredictionMethod::Baseline,
            score: Some(score),
        }
    }
}

/// Map a baseline score onto a risk level
pub fn level_for_score(score: f64) -> RiskLevel {
    if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Display-only distribution derived from the score. Does not sum to 1.
pub fn synthetic_probabilities(score: f64) -> RiskProbabilities {
    RiskProbabilities {
        low: (1.0 - score).max(0.0),
        medium: if score >= MEDIUM_RISK_THRESHOLD {
            score - MEDIUM_RISK_THRESHOLD
        } else {
            0.0
        },
        high: if score >= HIGH_RISK_THRESHOLD {
            score - HIGH_RISK_THRESHOLD
        } else {
            0.0
        },
    }
}
