//! Record stores consumed by the prediction pipeline
//!
//! Each collaborator is a trait so the cycle can run against PostgreSQL in
//! production and against [`MemoryStore`] in tests.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    Alert, CrowdReport, HistoricalRecords, RiskLevel, RiskPrediction, Ward, WeatherObservation,
};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only weather observations, read-only to the pipeline
#[axum::async_trait]
pub trait WeatherStore: Send + Sync {
    /// Observations for a ward with `from <= observed_at <= to`
    async fn observations_between(
        &self,
        ward_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WeatherObservation>>;

    /// Every observation for a ward up to `to`
    async fn observations_until(
        &self,
        ward_id: Uuid,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WeatherObservation>>;

    /// Most recent observations across all wards that carry rainfall
    async fn recent_with_rainfall(&self, limit: usize) -> StoreResult<Vec<WeatherObservation>>;
}

#[axum::async_trait]
pub trait ReportStore: Send + Sync {
    /// Validated reports for a ward created within `[from, to]`
    async fn validated_between(
        &self,
        ward_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<CrowdReport>>;
}

/// Ward ids, names and the mutable current risk level
#[axum::async_trait]
pub trait WardRegistry: Send + Sync {
    async fn list_wards(&self) -> StoreResult<Vec<Ward>>;

    async fn get_ward(&self, ward_id: Uuid) -> StoreResult<Ward>;

    async fn update_risk_level(
        &self,
        ward_id: Uuid,
        level: RiskLevel,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

/// Immutable prediction audit log
#[axum::async_trait]
pub trait PredictionStore: Send + Sync {
    async fn insert_prediction(&self, prediction: &RiskPrediction) -> StoreResult<()>;

    /// Newest first
    async fn predictions_for_ward(
        &self,
        ward_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<RiskPrediction>>;
}

#[axum::async_trait]
pub trait TrainingDataStore: Send + Sync {
    async fn historical_records(&self) -> StoreResult<HistoricalRecords>;
}

#[axum::async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, alert: &Alert) -> StoreResult<()>;
}

/// One handle per collaborator, shared across services
#[derive(Clone)]
pub struct Stores {
    pub weather: Arc<dyn WeatherStore>,
    pub reports: Arc<dyn ReportStore>,
    pub wards: Arc<dyn WardRegistry>,
    pub predictions: Arc<dyn PredictionStore>,
    pub training: Arc<dyn TrainingDataStore>,
    pub alerts: Arc<dyn AlertStore>,
}

impl Stores {
    /// Every collaborator backed by one PostgreSQL pool
    pub fn postgres(db: PgPool) -> Self {
        Self::from_shared(Arc::new(PgStore::new(db)))
    }

    /// Every collaborator backed by one in-memory store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self::from_shared(store)
    }

    fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: WeatherStore
            + ReportStore
            + WardRegistry
            + PredictionStore
            + TrainingDataStore
            + AlertStore
            + 'static,
    {
        Self {
            weather: store.clone(),
            reports: store.clone(),
            wards: store.clone(),
            predictions: store.clone(),
            training: store.clone(),
            alerts: store,
        }
    }
}
