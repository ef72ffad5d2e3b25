//! Model training and artifact tests
//!
//! Tests for the training pipeline including:
//! - Minimum sample enforcement per training source
//! - Historical dataset construction
//! - Artifact persistence, digests and corruption detection
//! - Training outcomes never disturbing an existing artifact

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use flood_warning_backend::artifacts::{
    ArtifactBundle, ArtifactError, ArtifactMetadata, ArtifactRepository, FsArtifactRepository,
    MemoryArtifactRepository, MODEL_FILE,
};
use flood_warning_backend::services::ModelService;
use flood_warning_backend::stores::MemoryStore;
use shared::training::{
    self, historical_dataset, synthetic_dataset, TrainingError, TrainingSource,
};
use shared::{
    ClimatePattern, FallbackProfile, FloodHistoricalData, HistoricalFloodEvent, HistoricalRecords,
    ModelVariant, RiskLevel,
};
use uuid::Uuid;

fn event(ward_id: Uuid, level: RiskLevel, rainfall: f64) -> HistoricalFloodEvent {
    HistoricalFloodEvent {
        id: Uuid::new_v4(),
        event_name: "Long rains".to_string(),
        date_occurred: NaiveDate::from_ymd_opt(2018, 3, 14).unwrap(),
        risk_level: level,
        rainfall_mm: rainfall,
        temperature_c: None,
        humidity_pct: Some(90.0),
        wind_kmh: None,
        affected_wards: vec![ward_id],
    }
}

fn climate(ward_id: Uuid, month: u32, rainfall: f64, flooded: bool) -> ClimatePattern {
    ClimatePattern {
        ward_id,
        year: 2019,
        month,
        avg_rainfall_mm: rainfall,
        avg_temperature_c: 24.0,
        avg_humidity_pct: 65.0,
        flood_probability: if flooded { 0.8 } else { 0.1 },
        has_flood_occurred: flooded,
    }
}

fn historical_records(ward_id: Uuid, events: usize, dry_months: usize) -> HistoricalRecords {
    HistoricalRecords {
        events: (0..events)
            .map(|i| event(ward_id, RiskLevel::High, 120.0 + i as f64 * 10.0))
            .collect(),
        ward_history: vec![FloodHistoricalData {
            ward_id,
            year: 2018,
            avg_rainfall_mm: 95.0,
            vulnerability_index: 70.0,
        }],
        climate: (0..dry_months)
            .map(|m| climate(ward_id, (m % 12) as u32 + 1, 10.0 + m as f64, false))
            .collect(),
    }
}

fn sample_bundle(version: &str) -> ArtifactBundle {
    let variant = ModelVariant::baseline();
    let report = training::train(&synthetic_dataset(), &variant.ensemble, 5).unwrap();
    ArtifactBundle {
        model: report.model,
        metadata: ArtifactMetadata {
            variant: variant.name,
            version: version.to_string(),
            trained_at: Utc::now(),
            train_samples: report.train_samples,
            test_samples: report.test_samples,
            metrics: report.metrics,
        },
    }
}

fn model_service(
    variant: ModelVariant,
    store: Arc<MemoryStore>,
    artifacts: Arc<dyn ArtifactRepository>,
) -> ModelService {
    ModelService::new(variant, artifacts, store.clone(), store)
}

// ============================================================================
// Dataset Tests
// ============================================================================

#[cfg(test)]
mod dataset_tests {
    use super::*;

    /// One row per affected ward plus one per climate pattern
    #[test]
    fn test_historical_dataset_rows_and_labels() {
        let ward = Uuid::new_v4();
        let mut records = historical_records(ward, 2, 3);
        records.climate.push(climate(ward, 4, 200.0, true));
        records.events[0].affected_wards.push(Uuid::new_v4());

        let data = historical_dataset(&records, FallbackProfile::Advanced);
        assert_eq!(data.len(), 3 + 4);
        assert_eq!(data.class_counts(), [3, 0, 4]);

        // event row for the ward with yearly history
        let row = data.rows[0];
        assert_eq!(row[0], 120.0);
        assert_eq!(row[2], 95.0);
        assert_eq!(row[3], 25.0);
        assert_eq!(row[4], 90.0);
        assert_eq!(row[5], 5.0);
        assert_eq!(row[7], 7.0);

        // second affected ward has no yearly history
        assert_eq!(data.rows[1][2], 0.0);
    }

    /// Minimum sample counts per source
    #[test]
    fn test_min_samples_per_source() {
        assert_eq!(TrainingSource::Synthetic.min_samples(), 5);
        assert_eq!(TrainingSource::LiveSample.min_samples(), 5);
        assert_eq!(TrainingSource::Historical.min_samples(), 10);
    }

    /// Historical training with fewer than 10 rows fails
    #[test]
    fn test_historical_below_minimum_fails() {
        let data = historical_dataset(&historical_records(Uuid::new_v4(), 4, 5), FallbackProfile::Advanced);
        assert_eq!(data.len(), 9);

        let variant = ModelVariant::historical();
        let err = training::train(&data, &variant.ensemble, variant.source.min_samples()).unwrap_err();
        assert_eq!(err, TrainingError::InsufficientSamples { found: 9, required: 10 });
    }

    /// Evaluation covers every held-out sample
    #[test]
    fn test_synthetic_training_report() {
        let data = synthetic_dataset();
        let report = training::train(&data, &ModelVariant::baseline().ensemble, 5).unwrap();
        assert_eq!(report.train_samples + report.test_samples, data.len());
        assert!(report.test_samples > 0);
        assert_eq!(report.metrics.support.iter().sum::<usize>(), report.test_samples);
        assert!((0.0..=1.0).contains(&report.metrics.accuracy));
        assert!((0.0..=1.0).contains(&report.metrics.f1));
    }
}

// ============================================================================
// Artifact Tests
// ============================================================================

#[cfg(test)]
mod artifact_tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_artifact_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepository::new(dir.path());
        assert!(!repo.exists("v2.0").await);
        assert!(repo.load("v2.0").await.unwrap().is_none());

        let bundle = sample_bundle("v2.0");
        repo.save("v2.0", &bundle).await.unwrap();
        assert!(repo.exists("v2.0").await);

        let loaded = repo.load("v2.0").await.unwrap().unwrap();
        assert_eq!(loaded, bundle);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("v2.0")]);
    }

    /// Saving over an existing version swaps in the new bundle whole
    #[tokio::test]
    async fn test_fs_artifact_resave_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepository::new(dir.path());
        let first = sample_bundle("v2.0");
        repo.save("v2.0", &first).await.unwrap();

        let mut second = sample_bundle("v2.0");
        second.metadata.train_samples = first.metadata.train_samples + 1;
        repo.save("v2.0", &second).await.unwrap();

        assert_eq!(repo.load("v2.0").await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn test_fs_artifact_tamper_detected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepository::new(dir.path());
        repo.save("v2.0", &sample_bundle("v2.0")).await.unwrap();

        let path = repo.version_dir("v2.0").join(MODEL_FILE);
        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push(' ');
        std::fs::write(&path, text).unwrap();

        let err = repo.load("v2.0").await.unwrap_err();
        assert!(matches!(err, ArtifactError::Corrupt { .. }));
    }
}

// ============================================================================
// Model Service Tests
// ============================================================================

#[cfg(test)]
mod model_service_tests {
    use super::*;

    /// A failed historical training run leaves the stored artifact alone
    #[tokio::test]
    async fn test_failed_training_keeps_existing_artifact() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_historical(historical_records(Uuid::new_v4(), 3, 3))
            .await;

        let variant = ModelVariant::historical();
        let artifacts = Arc::new(MemoryArtifactRepository::new());
        let existing = sample_bundle(&variant.version);
        artifacts.save(&variant.version, &existing).await.unwrap();

        let service = model_service(variant.clone(), store, artifacts.clone());
        let outcome = service.train(true).await;

        assert!(!outcome.success);
        assert_eq!(outcome.samples, 6);
        assert!(outcome.reason.unwrap().contains("Insufficient"));
        let stored = artifacts.load(&variant.version).await.unwrap().unwrap();
        assert_eq!(stored, existing);
    }

    /// Without force an existing artifact is reused
    #[tokio::test]
    async fn test_train_without_force_skips() {
        let store = Arc::new(MemoryStore::new());
        let variant = ModelVariant::baseline();
        let artifacts = Arc::new(MemoryArtifactRepository::new());
        artifacts
            .save(&variant.version, &sample_bundle(&variant.version))
            .await
            .unwrap();

        let service = model_service(variant, store, artifacts);
        let outcome = service.train(false).await;
        assert!(outcome.success);
        assert!(outcome.skipped);
        assert!(service.ensure_trained().await.is_none());
    }

    /// Historical training with enough rows produces a loadable model
    #[tokio::test]
    async fn test_historical_training_succeeds() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_historical(historical_records(Uuid::new_v4(), 6, 6))
            .await;

        let artifacts = Arc::new(MemoryArtifactRepository::new());
        let service = model_service(ModelVariant::historical(), store, artifacts.clone());

        let outcome = service.ensure_trained().await.unwrap();
        assert!(outcome.success, "{:?}", outcome.reason);
        assert_eq!(outcome.class_distribution, [6, 0, 6]);
        assert!(artifacts.exists("v4.0-historical").await);

        let status = service.status().await;
        assert!(status.trained_model_loaded);
        assert_eq!(status.model_version, "v4.0-historical");
    }

    /// Live-sample training folds recent observations into the seed scenarios
    #[tokio::test]
    async fn test_live_sample_training_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let artifacts = Arc::new(MemoryArtifactRepository::new());
        let service = model_service(ModelVariant::advanced(), store, artifacts);

        let outcome = service.train(false).await;
        assert!(outcome.success, "{:?}", outcome.reason);
        assert_eq!(outcome.samples, synthetic_dataset().len());
        assert!(outcome.metrics.is_some());
    }
}
