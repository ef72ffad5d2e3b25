//! Business logic services for the Flood Warning System

pub mod alerting;
pub mod features;
pub mod model;
pub mod prediction;

pub use alerting::{event_channel, AlertDispatcher};
pub use features::FeatureService;
pub use model::{ActiveClassifier, LoadedModel, ModelService, ModelStatus, TrainingOutcome};
pub use prediction::{CycleSummary, PredictionCycle};
