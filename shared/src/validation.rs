//! Validation utilities for flood-risk records
//!
//! Checks applied before a prediction or report value is trusted.

use chrono::{DateTime, Utc};

use crate::features::{FeatureVector, FEATURE_NAMES};
use crate::models::RiskProbabilities;

const PROBABILITY_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Prediction Validations
// ============================================================================

/// Validate that class probabilities are finite, in [0, 1], and sum to 1
pub fn validate_probabilities(p: &RiskProbabilities) -> Result<(), &'static str> {
    let values = p.to_array();
    if values.iter().any(|v| !v.is_finite()) {
        return Err("Probabilities must be finite");
    }
    if values.iter().any(|&v| !(0.0..=1.0).contains(&v)) {
        return Err("Probabilities must be between 0 and 1");
    }
    if (p.sum() - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err("Probabilities must sum to 1");
    }
    Ok(())
}

/// Validate that a confidence value lies in [0, 1]
pub fn validate_confidence(confidence: f64) -> Result<(), &'static str> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err("Confidence must be between 0 and 1");
    }
    Ok(())
}

/// Validate that a validity window is non-empty
pub fn validate_prediction_window(
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> Result<(), &'static str> {
    if valid_until <= valid_from {
        return Err("Prediction validity window must end after it starts");
    }
    Ok(())
}

/// Validate that every feature is a finite number, naming the first offender
pub fn validate_feature_vector(features: &FeatureVector) -> Result<(), &'static str> {
    match features.to_array().iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(FEATURE_NAMES[idx]),
        None => Ok(()),
    }
}

// ============================================================================
// Crowd Report Validations
// ============================================================================

/// Validate a reporter reliability score (0-1)
pub fn validate_reliability_score(score: f64) -> Result<(), &'static str> {
    if !(0.0..=1.0).contains(&score) {
        return Err("Reliability score must be between 0 and 1");
    }
    Ok(())
}

/// Validate an upvote count
pub fn validate_upvotes(upvotes: i32) -> Result<(), &'static str> {
    if upvotes < 0 {
        return Err("Upvotes cannot be negative");
    }
    Ok(())
}
