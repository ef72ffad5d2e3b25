//! Feature assembly for a single ward

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{report_window, weather_window, FallbackProfile, FeatureBuilder, FeatureVector};
use uuid::Uuid;

use crate::stores::{ReportStore, StoreResult, WeatherStore};

/// Reads a ward's observations and reports and derives its feature vector
#[derive(Clone)]
pub struct FeatureService {
    weather: Arc<dyn WeatherStore>,
    reports: Arc<dyn ReportStore>,
    builder: FeatureBuilder,
}

impl FeatureService {
    pub fn new(
        weather: Arc<dyn WeatherStore>,
        reports: Arc<dyn ReportStore>,
        profile: FallbackProfile,
    ) -> Self {
        Self {
            weather,
            reports,
            builder: FeatureBuilder::new(profile),
        }
    }

    pub fn profile(&self) -> FallbackProfile {
        self.builder.profile()
    }

    /// Features for `ward_id` as of `now`. Missing data yields neutral
    /// values; only store failures are errors.
    pub async fn features_for(&self, ward_id: Uuid, now: DateTime<Utc>) -> StoreResult<FeatureVector> {
        let recent = self
            .weather
            .observations_between(ward_id, now - weather_window(), now)
            .await?;
        let history = self.weather.observations_until(ward_id, now).await?;
        let reports = self
            .reports
            .validated_between(ward_id, now - report_window(), now)
            .await?;

        let features = self.builder.build(now, &recent, &history, &reports);
        tracing::debug!(
            %ward_id,
            observations_24h = recent.len(),
            observations_total = history.len(),
            validated_reports = reports.len(),
            rainfall_24h_avg = features.rainfall_24h_avg,
            "Features built"
        );
        Ok(features)
    }
}
