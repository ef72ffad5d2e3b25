//! HTTP API tests
//!
//! Exercises the router against in-memory stores.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use flood_warning_backend::artifacts::MemoryArtifactRepository;
use flood_warning_backend::config::{
    Config, CycleConfig, DatabaseConfig, ModelConfig, SchedulerConfig, ServerConfig,
};
use flood_warning_backend::services::event_channel;
use flood_warning_backend::stores::{MemoryStore, Stores};
use flood_warning_backend::{create_app, AppState};
use serde_json::Value;
use shared::{ModelVariant, RiskLevel};
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 0,
        },
        model: ModelConfig {
            variant: "baseline".to_string(),
            artifact_dir: "unused".to_string(),
            train_on_startup: false,
        },
        cycle: CycleConfig::default(),
        scheduler: SchedulerConfig {
            enabled: false,
            interval_minutes: 120,
        },
    }
}

fn app(store: Arc<MemoryStore>) -> Router {
    let (tx, _rx) = event_channel();
    let state = AppState::new(
        Arc::new(test_config()),
        None,
        Stores::memory(store),
        ModelVariant::baseline(),
        Arc::new(MemoryArtifactRepository::new()),
        tx,
    );
    create_app(state)
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    dispatch(app, request).await
}

async fn send_json(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    dispatch(app, request).await
}

async fn dispatch(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// ============================================================================
// API Tests
// ============================================================================

#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_without_database() {
        let (status, body) = send(app(Arc::new(MemoryStore::new())), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "not configured");
        assert_eq!(body["model_version"], "v2.0");
    }

    #[tokio::test]
    async fn test_run_cycle_then_read_history() {
        let store = Arc::new(MemoryStore::new());
        let ward = store.add_ward("Kibera", RiskLevel::Low).await;
        let app = app(store);

        let (status, summary) = send(app.clone(), "POST", "/api/v1/predictions/run").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["predictions_created"], 1);

        let uri = format!("/api/v1/wards/{}/predictions?limit=5", ward.id);
        let (status, history) = send(app, "GET", &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().map(Vec::len), Some(1));
        assert_eq!(history[0]["model_version"], "v2.0-baseline");
    }

    #[tokio::test]
    async fn test_history_limit_validated() {
        let store = Arc::new(MemoryStore::new());
        let ward = store.add_ward("Kibera", RiskLevel::Low).await;

        let uri = format!("/api/v1/wards/{}/predictions?limit=0", ward.id);
        let (status, body) = send(app(store), "GET", &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_ward_is_404() {
        let uri = format!("/api/v1/wards/{}/features", uuid::Uuid::new_v4());
        let (status, body) = send(app(Arc::new(MemoryStore::new())), "GET", &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_train_and_status() {
        let app = app(Arc::new(MemoryStore::new()));

        let (status, before) = send(app.clone(), "GET", "/api/v1/model").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(before["trained_model_loaded"], false);

        let (status, outcome) = send(app.clone(), "POST", "/api/v1/model/train").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["success"], true);

        let (_, after) = send(app, "GET", "/api/v1/model").await;
        assert_eq!(after["trained_model_loaded"], true);
    }

    /// Retraining is skipped unless forced
    #[tokio::test]
    async fn test_train_force_flag() {
        let app = app(Arc::new(MemoryStore::new()));
        let (_, first) = send(app.clone(), "POST", "/api/v1/model/train").await;
        assert_eq!(first["skipped"], false);

        let (_, again) = send_json(
            app.clone(),
            "POST",
            "/api/v1/model/train",
            serde_json::json!({}),
        )
        .await;
        assert_eq!(again["skipped"], true);
        assert_eq!(again["success"], true);

        let (status, forced) = send_json(
            app,
            "POST",
            "/api/v1/model/train",
            serde_json::json!({ "force": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(forced["skipped"], false);
        assert_eq!(forced["success"], true);
    }
}
