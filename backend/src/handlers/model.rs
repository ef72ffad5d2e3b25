//! HTTP handlers for model training and status

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::services::{ModelStatus, TrainingOutcome};
use crate::AppState;

/// Input for a training request
#[derive(Debug, Default, Deserialize)]
pub struct TrainModelInput {
    #[serde(default)]
    pub force: bool,
}

/// Train the configured model variant. Training failures are reported in
/// the body with `success: false`.
pub async fn train_model(
    State(state): State<AppState>,
    input: Option<Json<TrainModelInput>>,
) -> Json<TrainingOutcome> {
    let input = input.map(|Json(i)| i).unwrap_or_default();
    Json(state.model.train(input.force).await)
}

/// Active model variant and artifact status
pub async fn get_model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.model.status().await)
}
