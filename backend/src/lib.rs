//! Flood Warning System - backend library
//!
//! Wires the shared feature builder and risk classifier to record stores,
//! model artifacts, the prediction cycle and the HTTP API.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod stores;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;

use artifacts::ArtifactRepository;
use services::{FeatureService, ModelService, PredictionCycle};
use shared::{ModelVariant, WardRiskChanged};
use stores::Stores;
use tokio::sync::mpsc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Present when running against PostgreSQL
    pub db: Option<sqlx::PgPool>,
    pub stores: Stores,
    pub features: FeatureService,
    pub model: Arc<ModelService>,
    pub cycle: PredictionCycle,
}

impl AppState {
    /// Assemble services for `variant` on top of `stores`
    pub fn new(
        config: Arc<Config>,
        db: Option<sqlx::PgPool>,
        stores: Stores,
        variant: ModelVariant,
        artifacts: Arc<dyn ArtifactRepository>,
        events: mpsc::Sender<WardRiskChanged>,
    ) -> Self {
        let features = FeatureService::new(
            stores.weather.clone(),
            stores.reports.clone(),
            variant.profile,
        );
        let model = Arc::new(ModelService::new(
            variant,
            artifacts,
            stores.training.clone(),
            stores.weather.clone(),
        ));
        let cycle = PredictionCycle::new(
            stores.wards.clone(),
            stores.predictions.clone(),
            features.clone(),
            model.clone(),
            events,
            &config.cycle,
        );

        Self {
            config,
            db,
            stores,
            features,
            model,
            cycle,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Flood Warning System API v1.0"
}
