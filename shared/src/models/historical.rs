//! Historical flood records used as labeled training data

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RiskLevel;

/// A documented past flood event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalFloodEvent {
    pub id: Uuid,
    pub event_name: String,
    pub date_occurred: NaiveDate,
    pub risk_level: RiskLevel,
    pub rainfall_mm: f64,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_kmh: Option<f64>,
    pub affected_wards: Vec<Uuid>,
}

/// Yearly flood statistics for one ward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodHistoricalData {
    pub ward_id: Uuid,
    pub year: i32,
    pub avg_rainfall_mm: f64,
    /// 0-100 vulnerability score
    pub vulnerability_index: f64,
}

/// Monthly climate summary for one ward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimatePattern {
    pub ward_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub avg_rainfall_mm: f64,
    pub avg_temperature_c: f64,
    pub avg_humidity_pct: f64,
    /// 0.0 to 1.0
    pub flood_probability: f64,
    pub has_flood_occurred: bool,
}

/// Everything the historical training source reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalRecords {
    pub events: Vec<HistoricalFloodEvent>,
    pub ward_history: Vec<FloodHistoricalData>,
    pub climate: Vec<ClimatePattern>,
}
