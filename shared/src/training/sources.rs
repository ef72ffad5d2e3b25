//! Labeled dataset builders for each [`TrainingSource`](super::TrainingSource)

use std::collections::HashMap;

use chrono::Datelike;
use uuid::Uuid;

use super::Dataset;
use crate::features::{FallbackProfile, FeatureVector};
use crate::models::{HistoricalRecords, RiskLevel, WeatherObservation};

/// Most recent observations folded into a live-sample dataset
pub const LIVE_SAMPLE_LIMIT: usize = 100;

/// Rainfall above this labels a live sample High
pub const HIGH_RAINFALL_MM: f64 = 80.0;

/// Rainfall above this labels a live sample Medium
pub const MEDIUM_RAINFALL_MM: f64 = 30.0;

// rainfall, trend, historical, temp, humidity, wind, reports, severity
const SCENARIOS: &[([f64; 8], RiskLevel)] = &[
    ([10.0, 5.0, 8.0, 25.0, 60.0, 10.0, 2.0, 5.0], RiskLevel::Medium),
    ([5.0, 2.0, 6.0, 28.0, 50.0, 5.0, 0.0, 0.0], RiskLevel::Low),
    ([30.0, 15.0, 20.0, 22.0, 80.0, 15.0, 5.0, 7.0], RiskLevel::High),
    ([2.0, 1.0, 3.0, 30.0, 40.0, 2.0, 0.0, 0.0], RiskLevel::Low),
    ([25.0, 12.0, 18.0, 20.0, 75.0, 12.0, 3.0, 4.0], RiskLevel::Medium),
    // heavy rain periods
    ([150.0, 80.0, 120.0, 20.0, 85.0, 15.0, 8.0, 9.0], RiskLevel::High),
    ([120.0, 60.0, 100.0, 19.0, 80.0, 12.0, 6.0, 8.0], RiskLevel::High),
    ([100.0, 50.0, 90.0, 21.0, 75.0, 10.0, 5.0, 7.0], RiskLevel::High),
    ([140.0, 70.0, 110.0, 20.0, 82.0, 14.0, 7.0, 8.0], RiskLevel::High),
    // moderate rain periods
    ([40.0, 15.0, 35.0, 25.0, 60.0, 8.0, 2.0, 4.0], RiskLevel::Medium),
    ([50.0, 20.0, 40.0, 24.0, 65.0, 9.0, 3.0, 5.0], RiskLevel::Medium),
    ([35.0, 10.0, 30.0, 26.0, 55.0, 7.0, 1.0, 3.0], RiskLevel::Medium),
    ([60.0, 25.0, 50.0, 23.0, 70.0, 10.0, 4.0, 6.0], RiskLevel::Medium),
    // dry periods
    ([5.0, -2.0, 10.0, 28.0, 40.0, 3.0, 0.0, 0.0], RiskLevel::Low),
    ([2.0, -1.0, 8.0, 30.0, 35.0, 2.0, 0.0, 0.0], RiskLevel::Low),
    ([8.0, -3.0, 12.0, 27.0, 45.0, 4.0, 0.0, 1.0], RiskLevel::Low),
    ([3.0, 0.0, 9.0, 29.0, 38.0, 2.0, 0.0, 0.0], RiskLevel::Low),
];

/// The embedded hand-labeled scenarios
pub fn synthetic_dataset() -> Dataset {
    let mut data = Dataset::new();
    for &(row, level) in SCENARIOS {
        data.push(FeatureVector::from_array(row), level);
    }
    data
}

/// Label a raw rainfall reading
pub fn label_for_rainfall(rainfall_mm: f64) -> RiskLevel {
    if rainfall_mm > HIGH_RAINFALL_MM {
        RiskLevel::High
    } else if rainfall_mm > MEDIUM_RAINFALL_MM {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Synthetic scenarios plus up to [`LIVE_SAMPLE_LIMIT`] of the most recent
/// observations that carry a finite rainfall value.
pub fn live_sample_dataset(
    observations: &[WeatherObservation],
    profile: FallbackProfile,
) -> Dataset {
    let defaults = profile.defaults();
    let mut recent: Vec<&WeatherObservation> = observations
        .iter()
        .filter(|o| o.rainfall_mm.is_some_and(f64::is_finite))
        .collect();
    recent.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));

    let mut data = synthetic_dataset();
    for obs in recent.into_iter().take(LIVE_SAMPLE_LIMIT) {
        let rain = obs.rainfall_mm.unwrap_or_default();
        let features = FeatureVector {
            rainfall_24h_avg: rain,
            rainfall_trend: rain * 0.5,
            rainfall_historical_avg: rain * 0.8,
            temperature: obs.temperature_c.unwrap_or(defaults.temperature_c),
            humidity: obs.humidity_pct.unwrap_or(defaults.humidity_pct),
            wind_speed: obs.wind_kmh.unwrap_or(defaults.wind_kmh),
            validated_reports_7d: 0.0,
            report_severity_avg: rain / 20.0,
        };
        data.push(features, label_for_rainfall(rain));
    }
    data
}

/// One row per (event, affected ward) labeled by the event's risk level, plus
/// one row per climate pattern labeled High if a flood occurred, else Low.
///
/// Vulnerability (0..100) is mapped onto the 0..10 severity column.
pub fn historical_dataset(records: &HistoricalRecords, profile: FallbackProfile) -> Dataset {
    let defaults = profile.defaults();
    let history: HashMap<(Uuid, i32), (f64, f64)> = records
        .ward_history
        .iter()
        .map(|h| ((h.ward_id, h.year), (h.avg_rainfall_mm, h.vulnerability_index)))
        .collect();

    let mut data = Dataset::new();
    for event in &records.events {
        let year = event.date_occurred.year();
        for ward_id in &event.affected_wards {
            let (historical_avg, vulnerability) =
                history.get(&(*ward_id, year)).copied().unwrap_or((0.0, 0.0));
            let features = FeatureVector {
                rainfall_24h_avg: event.rainfall_mm,
                rainfall_trend: 0.0,
                rainfall_historical_avg: historical_avg,
                temperature: event.temperature_c.unwrap_or(defaults.temperature_c),
                humidity: event.humidity_pct.unwrap_or(defaults.humidity_pct),
                wind_speed: event.wind_kmh.unwrap_or(defaults.wind_kmh),
                validated_reports_7d: 0.0,
                report_severity_avg: (vulnerability / 10.0).clamp(0.0, 10.0),
            };
            data.push(features, event.risk_level);
        }
    }

    for pattern in &records.climate {
        let features = FeatureVector {
            rainfall_24h_avg: pattern.avg_rainfall_mm,
            rainfall_trend: 0.0,
            rainfall_historical_avg: pattern.avg_rainfall_mm,
            temperature: pattern.avg_temperature_c,
            humidity: pattern.avg_humidity_pct,
            wind_speed: defaults.wind_kmh,
            validated_reports_7d: 0.0,
            report_severity_avg: (pattern.flood_probability * 10.0).clamp(0.0, 10.0),
        };
        let level = if pattern.has_flood_occurred {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };
        data.push(features, level);
    }

    data
}
