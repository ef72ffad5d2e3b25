//! Prediction cycle tests
//!
//! Tests for the cycle orchestrator including:
//! - Prediction validity window and version tagging
//! - End-to-end baseline scenarios
//! - Ward state idempotence and escalation alerts
//! - Skipped and failed wards not affecting the rest of the cycle

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flood_warning_backend::artifacts::{
    ArtifactRepository, FsArtifactRepository, MemoryArtifactRepository, SCALER_FILE,
};
use flood_warning_backend::config::CycleConfig;
use flood_warning_backend::error::AppError;
use flood_warning_backend::services::{
    event_channel, AlertDispatcher, ModelService, PredictionCycle,
};
use flood_warning_backend::stores::{MemoryStore, ReportStore, WardRegistry};
use shared::{
    CrowdReport, ModelVariant, PredictionMethod, ReportStatus, RiskLevel, WardRiskChanged,
    WeatherObservation, WeatherSource,
};
use tokio::sync::mpsc;
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 24, 12, 0, 0).unwrap()
}

fn observation(ward_id: Uuid, at: DateTime<Utc>, rainfall: f64) -> WeatherObservation {
    WeatherObservation {
        id: Uuid::new_v4(),
        ward_id,
        source: WeatherSource::OpenWeatherMap,
        rainfall_mm: Some(rainfall),
        temperature_c: Some(21.0),
        humidity_pct: Some(80.0),
        wind_kmh: Some(9.0),
        cloud_pct: Some(75.0),
        observed_at: at,
        ingested_at: at,
    }
}

fn validated_report(ward_id: Uuid, at: DateTime<Utc>) -> CrowdReport {
    CrowdReport {
        id: Uuid::new_v4(),
        ward_id,
        reliability_score: 0.8,
        upvotes: 3,
        status: ReportStatus::Validated,
        created_at: at,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    cycle: PredictionCycle,
    model: Arc<ModelService>,
    events: mpsc::Receiver<WardRiskChanged>,
    dispatcher: AlertDispatcher,
}

fn harness_with(
    variant: ModelVariant,
    artifacts: Arc<dyn ArtifactRepository>,
    config: CycleConfig,
) -> Harness {
    harness_with_channel(variant, artifacts, config, event_channel())
}

fn harness_with_channel(
    variant: ModelVariant,
    artifacts: Arc<dyn ArtifactRepository>,
    config: CycleConfig,
    (tx, rx): (mpsc::Sender<WardRiskChanged>, mpsc::Receiver<WardRiskChanged>),
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let stores = flood_warning_backend::stores::Stores::memory(store.clone());
    let features = flood_warning_backend::services::FeatureService::new(
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
        features,
        model.clone(),
        tx,
        &config,
    );
    Harness {
        store,
        cycle,
        model,
        events: rx,
        dispatcher: AlertDispatcher::new(stores.alerts.clone()),
    }
}

fn harness() -> Harness {
    harness_with(
        ModelVariant::baseline(),
        Arc::new(MemoryArtifactRepository::new()),
        CycleConfig::default(),
    )
}

impl Harness {
    /// Feed every pending transition to the alert dispatcher
    async fn dispatch_pending(&mut self) -> Vec<WardRiskChanged> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            self.dispatcher.handle(&event).await.unwrap();
            seen.push(event);
        }
        seen
    }
}

// ============================================================================
// Recording Tests
// ============================================================================

#[cfg(test)]
mod recording_tests {
    use super::*;

    /// Every prediction is valid for exactly two hours from the cycle instant
    #[tokio::test]
    async fn test_prediction_window_is_two_hours() {
        let h = harness();
        h.store.add_ward("Kibera", RiskLevel::Low).await;
        h.store.add_ward("Mathare", RiskLevel::Low).await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.predictions_created, 2);

        for p in h.store.predictions().await {
            assert_eq!(p.valid_from, now());
            assert_eq!(p.valid_until - p.valid_from, Duration::hours(2));
            assert!(p.is_valid_at(now() + Duration::minutes(119)));
            assert!(!p.is_valid_at(now() + Duration::hours(2)));
        }
    }

    /// Without a trained artifact predictions are tagged as baseline
    #[tokio::test]
    async fn test_baseline_version_tag_without_artifact() {
        let h = harness();
        h.store.add_ward("Kibera", RiskLevel::Low).await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.baseline_predictions, 1);
        assert_eq!(summary.trained_predictions, 0);

        let p = &h.store.predictions().await[0];
        assert_eq!(p.method, PredictionMethod::Baseline);
        assert_eq!(p.model_version, "v2.0-baseline");
    }

    /// The audit snapshot holds the features the classifier saw
    #[tokio::test]
    async fn test_features_used_recorded() {
        let h = harness();
        let ward = h.store.add_ward("Embakasi", RiskLevel::Low).await;
        h.store
            .add_observation(observation(ward.id, now() - Duration::hours(3), 18.0))
            .await;

        h.cycle.run(now()).await.unwrap();
        let p = &h.store.predictions().await[0];
        assert_eq!(p.features_used.rainfall_24h_avg, 18.0);
        assert_eq!(p.features_used.temperature, 21.0);

        let restored = shared::FeatureVector::from_json(p.features_used.to_json()).unwrap();
        assert_eq!(restored, p.features_used);
    }

    /// A trained artifact switches predictions to the ensemble
    #[tokio::test]
    async fn test_trained_predictions_after_training() {
        let h = harness();
        let ward = h.store.add_ward("Westlands", RiskLevel::Low).await;
        h.store
            .add_observation(observation(ward.id, now() - Duration::hours(1), 140.0))
            .await;

        let outcome = h.model.ensure_trained().await.unwrap();
        assert!(outcome.success, "{:?}", outcome.reason);

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.trained_predictions, 1);

        let p = &h.store.predictions().await[0];
        assert_eq!(p.model_version, "v2.0");
        assert_eq!(p.method, PredictionMethod::Trained);
        assert!((p.probabilities.sum() - 1.0).abs() <= 1e-6);
        assert_eq!(p.predicted_level, p.probabilities.argmax());
    }

    /// An inference error on one ward uses the baseline for that ward only
    #[tokio::test]
    async fn test_inference_failure_falls_back_per_ward() {
        let repo = Arc::new(MemoryArtifactRepository::new());
        let trainer = harness_with(ModelVariant::baseline(), repo.clone(), CycleConfig::default());
        assert!(trainer.model.train(true).await.success);

        // A near-zero rainfall scale makes extreme rainfall overflow once standardized
        let mut bundle = repo.load("v2.0").await.unwrap().unwrap();
        bundle.model.scaler.scale[0] = 1e-300;
        repo.save("v2.0", &bundle).await.unwrap();

        let h = harness_with(ModelVariant::baseline(), repo, CycleConfig::default());
        let extreme = h.store.add_ward("Kibera", RiskLevel::Low).await;
        let normal = h.store.add_ward("Karen", RiskLevel::Low).await;
        h.store
            .add_observation(observation(extreme.id, now() - Duration::hours(1), 1e10))
            .await;
        h.store
            .add_observation(observation(normal.id, now() - Duration::hours(1), 2.0))
            .await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.predictions_created, 2);
        assert_eq!(summary.trained_predictions, 1);
        assert_eq!(summary.baseline_predictions, 1);

        let predictions = h.store.predictions().await;
        let for_ward = |id: Uuid| predictions.iter().find(|p| p.ward_id == id).unwrap();
        assert_eq!(for_ward(extreme.id).method, PredictionMethod::Baseline);
        assert_eq!(for_ward(extreme.id).model_version, "v2.0-baseline");
        assert_eq!(for_ward(extreme.id).predicted_level, RiskLevel::High);
        assert_eq!(for_ward(normal.id).method, PredictionMethod::Trained);
        assert_eq!(for_ward(normal.id).model_version, "v2.0");
    }

    /// A corrupt artifact degrades to the baseline instead of failing
    #[tokio::test]
    async fn test_corrupt_artifact_falls_back_to_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(FsArtifactRepository::new(dir.path()));

        let trainer = harness_with(ModelVariant::baseline(), repo.clone(), CycleConfig::default());
        assert!(trainer.model.train(true).await.success);
        std::fs::write(repo.version_dir("v2.0").join(SCALER_FILE), b"{}").unwrap();

        let h = harness_with(ModelVariant::baseline(), repo, CycleConfig::default());
        h.store.add_ward("Kasarani", RiskLevel::Low).await;
        let summary = h.cycle.run(now()).await.unwrap();

        assert_eq!(summary.baseline_predictions, 1);
        assert_eq!(h.store.predictions().await[0].model_version, "v2.0-baseline");
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[cfg(test)]
mod scenario_tests {
    use super::*;

    /// Scenario A: light rain and no reports stays Low
    #[tokio::test]
    async fn test_scenario_a_low() {
        let h = harness();
        let ward = h.store.add_ward("Langata", RiskLevel::Low).await;
        h.store
            .add_observation(observation(ward.id, now() - Duration::hours(2), 5.0))
            .await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.transitions, 0);
        assert_eq!(h.store.predictions().await[0].predicted_level, RiskLevel::Low);
    }

    /// Scenario B: heavy rain with many validated reports is High
    #[tokio::test]
    async fn test_scenario_b_high() {
        let h = harness();
        let ward = h.store.add_ward("Mukuru", RiskLevel::Low).await;
        h.store
            .add_observation(observation(ward.id, now() - Duration::hours(2), 60.0))
            .await;
        for day in 0..8 {
            h.store
                .add_report(validated_report(ward.id, now() - Duration::days(day) - Duration::minutes(5)))
                .await;
        }

        h.cycle.run(now()).await.unwrap();
        let p = &h.store.predictions().await[0];
        assert_eq!(p.features_used.validated_reports_7d, 7.0);
        assert_eq!(p.predicted_level, RiskLevel::High);
    }

    /// Scenario C: Low to High across cycles overwrites once and alerts once
    #[tokio::test]
    async fn test_scenario_c_single_escalation_alert() {
        let mut h = harness();
        let ward = h.store.add_ward("Mathare", RiskLevel::Low).await;
        let quiet = h.store.add_ward("Karen", RiskLevel::Low).await;
        h.store
            .add_observation(observation(quiet.id, now() - Duration::hours(1), 1.0))
            .await;

        let first = h.cycle.run(now()).await.unwrap();
        assert_eq!(first.transitions, 0);
        assert!(h.dispatch_pending().await.is_empty());

        let later = now() + Duration::hours(2);
        h.store
            .add_observation(observation(ward.id, later - Duration::hours(1), 90.0))
            .await;
        for _ in 0..8 {
            h.store
                .add_report(validated_report(ward.id, later - Duration::hours(3)))
                .await;
        }

        let second = h.cycle.run(later).await.unwrap();
        assert_eq!(second.transitions, 1);
        let events = h.dispatch_pending().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ward_id, ward.id);
        assert_eq!((events[0].old, events[0].new), (RiskLevel::Low, RiskLevel::High));

        let stored = h.store.get_ward(ward.id).await.unwrap();
        assert_eq!(stored.current_risk_level, RiskLevel::High);

        let third = h.cycle.run(later).await.unwrap();
        assert_eq!(third.transitions, 0);
        assert!(h.dispatch_pending().await.is_empty());

        let alerts = h.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].ward_id, ward.id);
        assert_eq!(alerts[0].risk_level, RiskLevel::High);
        assert!(alerts[0].message.contains("Mathare"));
    }

    /// De-escalation is recorded as a transition but raises no alert
    #[tokio::test]
    async fn test_de_escalation_no_alert() {
        let mut h = harness();
        h.store.add_ward("Dagoretti", RiskLevel::High).await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.transitions, 1);
        assert_eq!(h.dispatch_pending().await.len(), 1);
        assert!(h.store.alerts().await.is_empty());
    }

    /// Re-running with unchanged inputs leaves ward state unchanged but
    /// still appends to the audit log
    #[tokio::test]
    async fn test_cycle_idempotent_for_ward_state() {
        let h = harness();
        let ward = h.store.add_ward("Ruaraka", RiskLevel::Low).await;
        h.store
            .add_observation(observation(ward.id, now() - Duration::hours(1), 45.0))
            .await;

        let first = h.cycle.run(now()).await.unwrap();
        let level_after_first = h.store.get_ward(ward.id).await.unwrap().current_risk_level;
        let second = h.cycle.run(now()).await.unwrap();
        let level_after_second = h.store.get_ward(ward.id).await.unwrap().current_risk_level;

        assert_eq!(first.transitions, 1);
        assert_eq!(second.transitions, 0);
        assert_eq!(level_after_first, level_after_second);
        assert_eq!(h.store.predictions().await.len(), 2);
    }
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[cfg(test)]
mod failure_tests {
    use super::*;

    /// A ward whose lookups fail is skipped; others still get predictions
    #[tokio::test]
    async fn test_failing_ward_skipped() {
        let h = harness();
        let broken = h.store.add_ward("Broken", RiskLevel::Low).await;
        h.store.add_ward("Healthy", RiskLevel::Low).await;
        h.store.fail_lookups_for(broken.id).await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.wards_total, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions_created, 1);
        assert!(h.store.predictions().await.iter().all(|p| p.ward_id != broken.id));
    }

    /// A ward that exceeds its time budget is skipped
    #[tokio::test]
    async fn test_slow_ward_times_out() {
        let h = harness_with(
            ModelVariant::baseline(),
            Arc::new(MemoryArtifactRepository::new()),
            CycleConfig {
                max_concurrency: 2,
                ward_timeout_secs: 1,
            },
        );
        let slow = h.store.add_ward("Slow", RiskLevel::Low).await;
        h.store.add_ward("Fast", RiskLevel::Low).await;
        h.store.stall_lookups_for(slow.id, StdDuration::from_secs(3)).await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions_created, 1);
    }

    /// A backed-up alert channel delays the cycle but every transition arrives
    #[tokio::test]
    async fn test_slow_dispatcher_loses_no_transitions() {
        let mut h = harness_with_channel(
            ModelVariant::baseline(),
            Arc::new(MemoryArtifactRepository::new()),
            CycleConfig {
                max_concurrency: 8,
                ward_timeout_secs: 1,
            },
            mpsc::channel(1),
        );
        let mut wards = Vec::new();
        for name in ["Kibera", "Mathare", "Mukuru"] {
            wards.push(h.store.add_ward(name, RiskLevel::High).await);
        }

        let mut events = std::mem::replace(&mut h.events, mpsc::channel(1).1);
        let reader = tokio::spawn(async move {
            // Start draining only after the ward timeout has elapsed
            tokio::time::sleep(StdDuration::from_millis(1500)).await;
            let mut seen = Vec::new();
            while seen.len() < 3 {
                match events.recv().await {
                    Some(event) => seen.push(event),
                    None => break,
                }
            }
            seen
        });

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.predictions_created, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.transitions, 3);

        let seen = reader.await.unwrap();
        assert_eq!(seen.len(), 3);
        for ward in &wards {
            assert!(seen.iter().any(|e| e.ward_id == ward.id && e.new == RiskLevel::Low));
            assert_eq!(
                h.store.get_ward(ward.id).await.unwrap().current_risk_level,
                RiskLevel::Low
            );
        }
    }

    /// A failed prediction write counts as failed and does not touch the ward
    #[tokio::test]
    async fn test_write_failure_counted() {
        let h = harness();
        let ward = h.store.add_ward("Readonly", RiskLevel::High).await;
        h.store.fail_writes_for(ward.id).await;

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.transitions, 0);
        let stored = h.store.get_ward(ward.id).await.unwrap();
        assert_eq!(stored.current_risk_level, RiskLevel::High);
    }

    /// Failing to list wards fails the whole cycle
    #[tokio::test]
    async fn test_ward_listing_failure_fails_cycle() {
        let h = harness();
        h.store.add_ward("Kibera", RiskLevel::Low).await;
        h.store.set_fail_listing(true).await;

        let err = h.cycle.run(now()).await.unwrap_err();
        assert!(matches!(err, AppError::CycleFailed(_)));
        assert!(h.store.predictions().await.is_empty());
    }

    /// Many wards under a small concurrency limit are all evaluated
    #[tokio::test]
    async fn test_bounded_fan_out_covers_all_wards() {
        let h = harness_with(
            ModelVariant::baseline(),
            Arc::new(MemoryArtifactRepository::new()),
            CycleConfig {
                max_concurrency: 2,
                ward_timeout_secs: 5,
            },
        );
        for i in 0..12 {
            h.store.add_ward(&format!("Ward {}", i), RiskLevel::Low).await;
        }

        let summary = h.cycle.run(now()).await.unwrap();
        assert_eq!(summary.predictions_created, 12);
        assert_eq!(h.store.predictions().await.len(), 12);
    }
}

// ============================================================================
// Store Tests
// ============================================================================

#[cfg(test)]
mod store_tests {
    use super::*;

    /// Report lookups are bounded on both ends of the window
    #[tokio::test]
    async fn test_validated_reports_bounded_by_now() {
        let store = MemoryStore::new();
        let ward = store.add_ward("Kibera", RiskLevel::Low).await;
        store.add_report(validated_report(ward.id, now() - Duration::days(8))).await;
        store.add_report(validated_report(ward.id, now() - Duration::days(2))).await;
        store.add_report(validated_report(ward.id, now())).await;
        store.add_report(validated_report(ward.id, now() + Duration::hours(1))).await;

        let reports = store
            .validated_between(ward.id, now() - Duration::days(7), now())
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.created_at <= now()));
    }
}
