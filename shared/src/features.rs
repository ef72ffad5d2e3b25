//! Per-ward feature derivation
//!
//! Turns a ward's weather observations and validated crowd reports into the
//! fixed 8-element vector consumed by the risk classifier. Missing data never
//! fails the build; absent values resolve to the active profile's neutral
//! constants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CrowdReport, WeatherObservation};
use crate::validation::{validate_reliability_score, validate_upvotes};

/// Number of features in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 8;

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "rainfall_24h_avg",
    "rainfall_trend",
    "rainfall_historical_avg",
    "temperature",
    "humidity",
    "wind_speed",
    "validated_reports_7d",
    "report_severity_avg",
];

/// Lookback for the recent weather window
pub fn weather_window() -> Duration {
    Duration::hours(24)
}

/// Lookback for validated crowd reports
pub fn report_window() -> Duration {
    Duration::days(7)
}

/// Named set of neutral constants used when current conditions are unknown.
///
/// The two generations of the model were fitted with different defaults, so
/// the profile must match the deployed model version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackProfile {
    #[default]
    Baseline,
    Advanced,
}

/// Neutral values for the current-conditions features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeutralDefaults {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_kmh: f64,
}

impl FallbackProfile {
    pub fn defaults(&self) -> NeutralDefaults {
        match self {
            FallbackProfile::Baseline => NeutralDefaults {
                temperature_c: 20.0,
                humidity_pct: 50.0,
                wind_kmh: 0.0,
            },
            FallbackProfile::Advanced => NeutralDefaults {
                temperature_c: 25.0,
                humidity_pct: 60.0,
                wind_kmh: 5.0,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackProfile::Baseline => "baseline",
            FallbackProfile::Advanced => "advanced",
        }
    }
}

/// Feature snapshot for one ward at one evaluation instant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct FeatureVector {
    pub rainfall_24h_avg: f64,
    pub rainfall_trend: f64,
    pub rainfall_historical_avg: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub validated_reports_7d: f64,
    pub report_severity_avg: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.rainfall_24h_avg,
            self.rainfall_trend,
            self.rainfall_historical_avg,
            self.temperature,
            self.humidity,
            self.wind_speed,
            self.validated_reports_7d,
            self.report_severity_avg,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            rainfall_24h_avg: values[0],
            rainfall_trend: values[1],
            rainfall_historical_avg: values[2],
            temperature: values[3],
            humidity: values[4],
            wind_speed: values[5],
            validated_reports_7d: values[6],
            report_severity_avg: values[7],
        }
    }

    /// Name-keyed form stored alongside predictions for audit
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Derives [`FeatureVector`]s with a fixed fallback profile
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder {
    profile: FallbackProfile,
}

impl FeatureBuilder {
    pub fn new(profile: FallbackProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> FallbackProfile {
        self.profile
    }

    /// Build the feature vector for `now`.
    ///
    /// `weather_24h` and `weather_history` may be passed unfiltered; rows
    /// outside their windows are ignored. Reports that are not validated or
    /// fall outside the 7-day window are ignored as well.
    ///
    /// Non-finite readings count as absent and malformed reports are
    /// dropped, so the result is always finite.
    pub fn build(
        &self,
        now: DateTime<Utc>,
        weather_24h: &[WeatherObservation],
        weather_history: &[WeatherObservation],
        reports: &[CrowdReport],
    ) -> FeatureVector {
        let defaults = self.profile.defaults();

        let window_start = now - weather_window();
        let mut recent: Vec<&WeatherObservation> = weather_24h
            .iter()
            .filter(|w| w.observed_at >= window_start && w.observed_at <= now)
            .collect();
        recent.sort_by_key(|w| w.observed_at);

        let recent_rain: Vec<f64> = recent.iter().filter_map(|w| finite(w.rainfall_mm)).collect();
        let historical_rain: Vec<f64> = weather_history
            .iter()
            .filter(|w| w.observed_at <= now)
            .filter_map(|w| finite(w.rainfall_mm))
            .collect();

        let latest = recent.last();
        let temperature = latest
            .and_then(|w| finite(w.temperature_c))
            .unwrap_or(defaults.temperature_c);
        let humidity = latest
            .and_then(|w| finite(w.humidity_pct))
            .unwrap_or(defaults.humidity_pct);
        let wind_speed = latest
            .and_then(|w| finite(w.wind_kmh))
            .unwrap_or(defaults.wind_kmh);

        let report_start = now - report_window();
        let severities: Vec<f64> = reports
            .iter()
            .filter(|r| r.is_validated() && r.created_at >= report_start && r.created_at <= now)
            .filter(|r| {
                validate_reliability_score(r.reliability_score).is_ok()
                    && validate_upvotes(r.upvotes).is_ok()
            })
            .map(CrowdReport::severity)
            .collect();

        FeatureVector {
            rainfall_24h_avg: mean(&recent_rain),
            rainfall_trend: trend(&recent_rain),
            rainfall_historical_avg: mean(&historical_rain),
            temperature,
            humidity,
            wind_speed,
            validated_reports_7d: severities.len() as f64,
            report_severity_avg: mean(&severities),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Arithmetic mean, 0 for an empty slice.
///
/// Accumulated incrementally so large finite inputs cannot overflow.
pub fn mean(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .fold(0.0, |avg, (i, v)| avg + (v - avg) / (i + 1) as f64)
}

/// Mean of the second half minus mean of the first half, split at `len / 2`
pub fn trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (first, second) = values.split_at(values.len() / 2);
    mean(second) - mean(first)
}
