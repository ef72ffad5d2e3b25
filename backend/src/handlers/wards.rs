//! HTTP handlers for ward risk endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{FeatureVector, RiskPrediction, Ward};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::AppState;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// List wards with their current risk levels
pub async fn list_wards(State(state): State<AppState>) -> AppResult<Json<Vec<Ward>>> {
    let wards = state.stores.wards.list_wards().await?;
    Ok(Json(wards))
}

/// Query parameters for a ward's prediction history
#[derive(Debug, Deserialize, Validate)]
pub struct PredictionHistoryQuery {
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}

/// Prediction audit trail for a ward, newest first
pub async fn get_ward_predictions(
    State(state): State<AppState>,
    Path(ward_id): Path<Uuid>,
    Query(query): Query<PredictionHistoryQuery>,
) -> AppResult<Json<Vec<RiskPrediction>>> {
    query.validate()?;
    state.stores.wards.get_ward(ward_id).await?;

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let predictions = state
        .stores
        .predictions
        .predictions_for_ward(ward_id, limit)
        .await?;
    Ok(Json(predictions))
}

#[derive(Debug, Serialize)]
pub struct WardFeaturesResponse {
    pub ward_id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub fallback_profile: &'static str,
    pub features: FeatureVector,
}

/// Features for a ward computed at request time
pub async fn get_ward_features(
    State(state): State<AppState>,
    Path(ward_id): Path<Uuid>,
) -> AppResult<Json<WardFeaturesResponse>> {
    state.stores.wards.get_ward(ward_id).await?;

    let now = Utc::now();
    let features = state.features.features_for(ward_id, now).await?;
    Ok(Json(WardFeaturesResponse {
        ward_id,
        computed_at: now,
        fallback_profile: state.features.profile().as_str(),
        features,
    }))
}
