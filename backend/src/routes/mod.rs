//! Route definitions for the Flood Warning System

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/wards", ward_routes())
        .nest("/predictions", prediction_routes())
        .nest("/model", model_routes())
}

/// Ward risk routes
fn ward_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_wards))
        .route("/:ward_id/predictions", get(handlers::get_ward_predictions))
        .route("/:ward_id/features", get(handlers::get_ward_features))
}

/// Prediction cycle routes
fn prediction_routes() -> Router<AppState> {
    Router::new().route("/run", post(handlers::run_prediction_cycle))
}

/// Model lifecycle routes
fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_model_status))
        .route("/train", post(handlers::train_model))
}
