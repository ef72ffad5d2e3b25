//! HTTP handlers for prediction cycles

use axum::{extract::State, Json};
use chrono::Utc;

use crate::error::AppResult;
use crate::services::CycleSummary;
use crate::AppState;

/// Run a prediction cycle for every ward now
pub async fn run_prediction_cycle(State(state): State<AppState>) -> AppResult<Json<CycleSummary>> {
    let summary = state.cycle.run(Utc::now()).await?;
    Ok(Json(summary))
}
