//! HTTP handlers for the Flood Warning System API

pub mod health;
pub mod model;
pub mod predictions;
pub mod wards;

pub use health::*;
pub use model::*;
pub use predictions::*;
pub use wards::*;
