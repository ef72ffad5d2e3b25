//! Flood risk classification
//!
//! Two operating modes share one output type ([`Classification`]):
//! - a trained soft-voting ensemble (random forest + gradient boosting)
//!   applied after standardization
//! - a deterministic rule-based baseline used when no trained model is
//!   available or inference fails

mod baseline;
mod boosting;
mod ensemble;
mod forest;
mod scaler;
mod tree;

pub use baseline::*;
pub use boosting::*;
pub use ensemble::*;
pub use forest::*;
pub use scaler::*;
pub use tree::*;

use thiserror::Error;

use crate::features::FEATURE_COUNT;

/// One standardized or raw feature row
pub type Row = [f64; FEATURE_COUNT];

/// Number of risk classes (Low, Medium, High)
pub const CLASS_COUNT: usize = 3;

/// Errors raised by trained-mode inference
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Feature '{0}' is not a finite number")]
    NonFiniteFeature(&'static str),

    #[error("Feature '{0}' is outside the range the model was fitted on")]
    OutOfRange(&'static str),

    #[error("Scaler expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model has no fitted estimators")]
    EmptyModel,

    #[error("Model produced an invalid distribution: {0:?}")]
    InvalidDistribution([f64; CLASS_COUNT]),
}
