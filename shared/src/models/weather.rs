//! Weather observation models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider a weather observation was ingested from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSource {
    OpenWeatherMap,
    OpenMeteo,
    Noaa,
    Nasa,
    Manual,
}

impl WeatherSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherSource::OpenWeatherMap => "openweathermap",
            WeatherSource::OpenMeteo => "open_meteo",
            WeatherSource::Noaa => "noaa",
            WeatherSource::Nasa => "nasa",
            WeatherSource::Manual => "manual",
        }
    }

    /// Unknown provider names are treated as manual entries
    pub fn from_db(s: &str) -> Self {
        match s {
            "openweathermap" => WeatherSource::OpenWeatherMap,
            "open_meteo" => WeatherSource::OpenMeteo,
            "noaa" => WeatherSource::Noaa,
            "nasa" => WeatherSource::Nasa,
            _ => WeatherSource::Manual,
        }
    }
}

/// One ingested weather reading for a ward. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherObservation {
    pub id: Uuid,
    pub ward_id: Uuid,
    pub source: WeatherSource,
    pub rainfall_mm: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_kmh: Option<f64>,
    pub cloud_pct: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}
