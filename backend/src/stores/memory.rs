use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::{
    Alert, CrowdReport, HistoricalRecords, RiskLevel, RiskPrediction, Ward, WeatherObservation,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AlertStore, PredictionStore, ReportStore, StoreError, StoreResult, TrainingDataStore,
    WardRegistry, WeatherStore,
};

/// In-process store implementing every collaborator trait.
///
/// Used by tests and local runs without a database. Lookups for a ward can be
/// made to fail or stall to exercise the cycle's skip paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    wards: Vec<Ward>,
    observations: Vec<WeatherObservation>,
    reports: Vec<CrowdReport>,
    predictions: Vec<RiskPrediction>,
    alerts: Vec<Alert>,
    historical: HistoricalRecords,
    failing_wards: HashSet<Uuid>,
    stalled_wards: HashMap<Uuid, Duration>,
    fail_listing: bool,
    fail_writes: HashSet<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_ward(&self, name: &str, level: RiskLevel) -> Ward {
        let ward = Ward {
            id: Uuid::new_v4(),
            name: name.to_string(),
            current_risk_level: level,
            updated_at: Utc::now(),
        };
        self.inner.write().await.wards.push(ward.clone());
        ward
    }

    pub async fn add_observation(&self, observation: WeatherObservation) {
        self.inner.write().await.observations.push(observation);
    }

    pub async fn add_report(&self, report: CrowdReport) {
        self.inner.write().await.reports.push(report);
    }

    pub async fn set_historical(&self, records: HistoricalRecords) {
        self.inner.write().await.historical = records;
    }

    /// Make weather and report lookups for `ward_id` fail
    pub async fn fail_lookups_for(&self, ward_id: Uuid) {
        self.inner.write().await.failing_wards.insert(ward_id);
    }

    /// Delay weather lookups for `ward_id`
    pub async fn stall_lookups_for(&self, ward_id: Uuid, delay: Duration) {
        self.inner.write().await.stalled_wards.insert(ward_id, delay);
    }

    /// Make prediction inserts for `ward_id` fail
    pub async fn fail_writes_for(&self, ward_id: Uuid) {
        self.inner.write().await.fail_writes.insert(ward_id);
    }

    pub async fn set_fail_listing(&self, fail: bool) {
        self.inner.write().await.fail_listing = fail;
    }

    pub async fn predictions(&self) -> Vec<RiskPrediction> {
        self.inner.read().await.predictions.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.clone()
    }

    async fn check_lookup(&self, ward_id: Uuid) -> StoreResult<()> {
        let stall = {
            let inner = self.inner.read().await;
            if inner.failing_wards.contains(&ward_id) {
                return Err(StoreError::Unavailable(format!("lookups for ward {}", ward_id)));
            }
            inner.stalled_wards.get(&ward_id).copied()
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[axum::async_trait]
impl WeatherStore for MemoryStore {
    async fn observations_between(
        &self,
        ward_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WeatherObservation>> {
        self.check_lookup(ward_id).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .observations
            .iter()
            .filter(|o| o.ward_id == ward_id && o.observed_at >= from && o.observed_at <= to)
            .cloned()
            .collect())
    }

    async fn observations_until(
        &self,
        ward_id: Uuid,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WeatherObservation>> {
        self.check_lookup(ward_id).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .observations
            .iter()
            .filter(|o| o.ward_id == ward_id && o.observed_at <= to)
            .cloned()
            .collect())
    }

    async fn recent_with_rainfall(&self, limit: usize) -> StoreResult<Vec<WeatherObservation>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<WeatherObservation> = inner
            .observations
            .iter()
            .filter(|o| o.rainfall_mm.is_some())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[axum::async_trait]
impl ReportStore for MemoryStore {
    async fn validated_between(
        &self,
        ward_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<CrowdReport>> {
        self.check_lookup(ward_id).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .reports
            .iter()
            .filter(|r| {
                r.ward_id == ward_id && r.is_validated() && r.created_at >= from && r.created_at <= to
            })
            .cloned()
            .collect())
    }
}

#[axum::async_trait]
impl WardRegistry for MemoryStore {
    async fn list_wards(&self) -> StoreResult<Vec<Ward>> {
        let inner = self.inner.read().await;
        if inner.fail_listing {
            return Err(StoreError::Unavailable("ward registry".to_string()));
        }
        Ok(inner.wards.clone())
    }

    async fn get_ward(&self, ward_id: Uuid) -> StoreResult<Ward> {
        let inner = self.inner.read().await;
        inner
            .wards
            .iter()
            .find(|w| w.id == ward_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Ward".to_string()))
    }

    async fn update_risk_level(
        &self,
        ward_id: Uuid,
        level: RiskLevel,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let ward = inner
            .wards
            .iter_mut()
            .find(|w| w.id == ward_id)
            .ok_or_else(|| StoreError::NotFound("Ward".to_string()))?;
        ward.current_risk_level = level;
        ward.updated_at = at;
        Ok(())
    }
}

#[axum::async_trait]
impl PredictionStore for MemoryStore {
    async fn insert_prediction(&self, prediction: &RiskPrediction) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.fail_writes.contains(&prediction.ward_id) {
            return Err(StoreError::Unavailable("prediction log".to_string()));
        }
        inner.predictions.push(prediction.clone());
        Ok(())
    }

    async fn predictions_for_ward(
        &self,
        ward_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<RiskPrediction>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<RiskPrediction> = inner
            .predictions
            .iter()
            .filter(|p| p.ward_id == ward_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[axum::async_trait]
impl TrainingDataStore for MemoryStore {
    async fn historical_records(&self) -> StoreResult<HistoricalRecords> {
        Ok(self.inner.read().await.historical.clone())
    }
}

#[axum::async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> StoreResult<()> {
        self.inner.write().await.alerts.push(alert.clone());
        Ok(())
    }
}
