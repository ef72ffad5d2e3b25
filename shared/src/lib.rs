//! Shared types and models for the Flood Warning System
//!
//! This crate holds everything that does not touch I/O: domain records,
//! feature derivation, the risk classifier and its training pipeline.

pub mod classifier;
pub mod features;
pub mod models;
pub mod training;
pub mod validation;
pub mod variant;

pub use features::*;
pub use models::*;
pub use validation::*;
pub use variant::*;
