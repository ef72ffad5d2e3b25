//! Domain models for the flood warning pipeline

mod alert;
mod historical;
mod prediction;
mod report;
mod ward;
mod weather;

pub use alert::*;
pub use historical::*;
pub use prediction::*;
pub use report::*;
pub use ward::*;
pub use weather::*;
