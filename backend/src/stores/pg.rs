//! PostgreSQL-backed stores

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    Alert, ClimatePattern, CrowdReport, FeatureVector, FloodHistoricalData, HistoricalFloodEvent,
    HistoricalRecords, PredictionMethod, ReportStatus, RiskLevel, RiskPrediction,
    RiskProbabilities, Ward, WeatherObservation, WeatherSource,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    AlertStore, PredictionStore, ReportStore, StoreError, StoreResult, TrainingDataStore,
    WardRegistry, WeatherStore,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn parse_level(value: &str) -> StoreResult<RiskLevel> {
    value.parse().map_err(StoreError::Malformed)
}

#[derive(Debug, FromRow)]
struct WardRow {
    id: Uuid,
    name: String,
    current_risk_level: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WardRow> for Ward {
    type Error = StoreError;

    fn try_from(row: WardRow) -> StoreResult<Self> {
        Ok(Ward {
            id: row.id,
            name: row.name,
            current_risk_level: parse_level(&row.current_risk_level)?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WeatherRow {
    id: Uuid,
    ward_id: Uuid,
    source: String,
    rainfall_mm: Option<f64>,
    temperature_c: Option<f64>,
    humidity_pct: Option<f64>,
    wind_kmh: Option<f64>,
    cloud_pct: Option<f64>,
    observed_at: DateTime<Utc>,
    ingested_at: DateTime<Utc>,
}

impl From<WeatherRow> for WeatherObservation {
    fn from(row: WeatherRow) -> Self {
        WeatherObservation {
            id: row.id,
            ward_id: row.ward_id,
            source: WeatherSource::from_db(&row.source),
            rainfall_mm: row.rainfall_mm,
            temperature_c: row.temperature_c,
            humidity_pct: row.humidity_pct,
            wind_kmh: row.wind_kmh,
            cloud_pct: row.cloud_pct,
            observed_at: row.observed_at,
            ingested_at: row.ingested_at,
        }
    }
}

const WEATHER_COLUMNS: &str = "id, ward_id, source, rainfall_mm, temperature_c, humidity_pct, \
                               wind_kmh, cloud_pct, observed_at, ingested_at";

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    ward_id: Uuid,
    reliability_score: f64,
    upvotes: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<ReportRow> for CrowdReport {
    fn from(row: ReportRow) -> Self {
        CrowdReport {
            id: row.id,
            ward_id: row.ward_id,
            reliability_score: row.reliability_score,
            upvotes: row.upvotes,
            status: ReportStatus::from_db(&row.status),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PredictionRow {
    id: Uuid,
    ward_id: Uuid,
    predicted_risk_level: String,
    confidence_score: f64,
    probability_low: f64,
    probability_medium: f64,
    probability_high: f64,
    features_used: serde_json::Value,
    model_version: String,
    method: String,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PredictionRow> for RiskPrediction {
    type Error = StoreError;

    fn try_from(row: PredictionRow) -> StoreResult<Self> {
        let features_used = FeatureVector::from_json(row.features_used)
            .map_err(|e| StoreError::Malformed(format!("features_used: {}", e)))?;
        Ok(RiskPrediction {
            id: row.id,
            ward_id: row.ward_id,
            predicted_level: parse_level(&row.predicted_risk_level)?,
            confidence: row.confidence_score,
            probabilities: RiskProbabilities {
                low: row.probability_low,
                medium: row.probability_medium,
                high: row.probability_high,
            },
            features_used,
            model_version: row.model_version,
            method: PredictionMethod::from_db(&row.method),
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    event_name: String,
    date_occurred: NaiveDate,
    risk_level: String,
    rainfall_mm: f64,
    temperature_c: Option<f64>,
    humidity_pct: Option<f64>,
    wind_kmh: Option<f64>,
}

#[derive(Debug, FromRow)]
struct EventWardRow {
    event_id: Uuid,
    ward_id: Uuid,
}

#[derive(Debug, FromRow)]
struct WardHistoryRow {
    ward_id: Uuid,
    year: i32,
    avg_rainfall_mm: f64,
    vulnerability_index: f64,
}

#[derive(Debug, FromRow)]
struct ClimateRow {
    ward_id: Uuid,
    year: i32,
    month: i32,
    avg_rainfall_mm: f64,
    avg_temperature_c: f64,
    avg_humidity_pct: f64,
    flood_probability: f64,
    has_flood_occurred: bool,
}

#[axum::async_trait]
impl WeatherStore for PgStore {
    async fn observations_between(
        &self,
        ward_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WeatherObservation>> {
        let rows = sqlx::query_as::<_, WeatherRow>(&format!(
            r#"
            SELECT {WEATHER_COLUMNS}
            FROM weather_observations
            WHERE ward_id = $1 AND observed_at >= $2 AND observed_at <= $3
            ORDER BY observed_at ASC
            "#
        ))
        .bind(ward_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn observations_until(
        &self,
        ward_id: Uuid,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WeatherObservation>> {
        let rows = sqlx::query_as::<_, WeatherRow>(&format!(
            r#"
            SELECT {WEATHER_COLUMNS}
            FROM weather_observations
            WHERE ward_id = $1 AND observed_at <= $2
            ORDER BY observed_at ASC
            "#
        ))
        .bind(ward_id)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_with_rainfall(&self, limit: usize) -> StoreResult<Vec<WeatherObservation>> {
        let rows = sqlx::query_as::<_, WeatherRow>(&format!(
            r#"
            SELECT {WEATHER_COLUMNS}
            FROM weather_observations
            WHERE rainfall_mm IS NOT NULL
            ORDER BY observed_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[axum::async_trait]
impl ReportStore for PgStore {
    async fn validated_between(
        &self,
        ward_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<CrowdReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, ward_id, reliability_score, upvotes, status, created_at
            FROM crowd_reports
            WHERE ward_id = $1 AND status = 'validated' AND created_at >= $2 AND created_at <= $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(ward_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[axum::async_trait]
impl WardRegistry for PgStore {
    async fn list_wards(&self) -> StoreResult<Vec<Ward>> {
        let rows = sqlx::query_as::<_, WardRow>(
            r#"
            SELECT id, name, current_risk_level, updated_at
            FROM wards
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Ward::try_from).collect()
    }

    async fn get_ward(&self, ward_id: Uuid) -> StoreResult<Ward> {
        let row = sqlx::query_as::<_, WardRow>(
            r#"
            SELECT id, name, current_risk_level, updated_at
            FROM wards
            WHERE id = $1
            "#,
        )
        .bind(ward_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| StoreError::NotFound("Ward".to_string()))?;

        row.try_into()
    }

    async fn update_risk_level(
        &self,
        ward_id: Uuid,
        level: RiskLevel,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wards
            SET current_risk_level = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(ward_id)
        .bind(level.as_str())
        .bind(at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Ward".to_string()));
        }
        Ok(())
    }
}

#[axum::async_trait]
impl PredictionStore for PgStore {
    async fn insert_prediction(&self, prediction: &RiskPrediction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flood_predictions (
                id, ward_id, predicted_risk_level, confidence_score,
                probability_low, probability_medium, probability_high,
                features_used, model_version, method, valid_from, valid_until, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(prediction.id)
        .bind(prediction.ward_id)
        .bind(prediction.predicted_level.as_str())
        .bind(prediction.confidence)
        .bind(prediction.probabilities.low)
        .bind(prediction.probabilities.medium)
        .bind(prediction.probabilities.high)
        .bind(prediction.features_used.to_json())
        .bind(&prediction.model_version)
        .bind(prediction.method.as_str())
        .bind(prediction.valid_from)
        .bind(prediction.valid_until)
        .bind(prediction.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn predictions_for_ward(
        &self,
        ward_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<RiskPrediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT id, ward_id, predicted_risk_level, confidence_score,
                   probability_low, probability_medium, probability_high,
                   features_used, model_version, method, valid_from, valid_until, created_at
            FROM flood_predictions
            WHERE ward_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(ward_id)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(RiskPrediction::try_from).collect()
    }
}

#[axum::async_trait]
impl TrainingDataStore for PgStore {
    async fn historical_records(&self) -> StoreResult<HistoricalRecords> {
        let events = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, event_name, date_occurred, risk_level, rainfall_mm,
                   temperature_c, humidity_pct, wind_kmh
            FROM historical_flood_events
            ORDER BY date_occurred ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let links = sqlx::query_as::<_, EventWardRow>(
            "SELECT event_id, ward_id FROM historical_flood_event_wards",
        )
        .fetch_all(&self.db)
        .await?;

        let mut affected: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for link in links {
            affected.entry(link.event_id).or_default().push(link.ward_id);
        }

        let events = events
            .into_iter()
            .map(|row| {
                Ok(HistoricalFloodEvent {
                    affected_wards: affected.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    event_name: row.event_name,
                    date_occurred: row.date_occurred,
                    risk_level: parse_level(&row.risk_level)?,
                    rainfall_mm: row.rainfall_mm,
                    temperature_c: row.temperature_c,
                    humidity_pct: row.humidity_pct,
                    wind_kmh: row.wind_kmh,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let ward_history = sqlx::query_as::<_, WardHistoryRow>(
            r#"
            SELECT ward_id, year, avg_rainfall_mm, vulnerability_index
            FROM flood_historical_data
            "#,
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|row| FloodHistoricalData {
            ward_id: row.ward_id,
            year: row.year,
            avg_rainfall_mm: row.avg_rainfall_mm,
            vulnerability_index: row.vulnerability_index,
        })
        .collect();

        let climate = sqlx::query_as::<_, ClimateRow>(
            r#"
            SELECT ward_id, year, month, avg_rainfall_mm, avg_temperature_c,
                   avg_humidity_pct, flood_probability, has_flood_occurred
            FROM climate_patterns
            ORDER BY year ASC, month ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|row| ClimatePattern {
            ward_id: row.ward_id,
            year: row.year,
            month: row.month.clamp(1, 12) as u32,
            avg_rainfall_mm: row.avg_rainfall_mm,
            avg_temperature_c: row.avg_temperature_c,
            avg_humidity_pct: row.avg_humidity_pct,
            flood_probability: row.flood_probability,
            has_flood_occurred: row.has_flood_occurred,
        })
        .collect();

        Ok(HistoricalRecords {
            events,
            ward_history,
            climate,
        })
    }
}

#[axum::async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(&self, alert: &Alert) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, ward_id, risk_level, message, prediction_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(alert.id)
        .bind(alert.ward_id)
        .bind(alert.risk_level.as_str())
        .bind(&alert.message)
        .bind(alert.prediction_id)
        .bind(alert.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
