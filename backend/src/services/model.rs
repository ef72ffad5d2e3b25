//! Risk model lifecycle: load, classify, train
//!
//! Holds the configured [`ModelVariant`], a cache of the loaded artifact and
//! the rule-based baseline. Every classification succeeds; anything wrong
//! with the trained path degrades to the baseline for that call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::classifier::{BaselineClassifier, TrainedModel, CLASS_COUNT};
use shared::training::{
    self, historical_dataset, live_sample_dataset, synthetic_dataset, Dataset,
    EvaluationMetrics, TrainingSource, LIVE_SAMPLE_LIMIT,
};
use shared::{Classification, FeatureVector, ModelVariant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::artifacts::{ArtifactBundle, ArtifactMetadata, ArtifactRepository};
use crate::stores::{TrainingDataStore, WeatherStore};

/// A trained model loaded from the artifact repository
#[derive(Debug)]
pub struct LoadedModel {
    pub model: TrainedModel,
    pub metadata: ArtifactMetadata,
}

/// Point-in-time classifier used for one whole cycle
#[derive(Debug, Clone)]
pub struct ActiveClassifier {
    trained: Option<Arc<LoadedModel>>,
    baseline: BaselineClassifier,
    version: String,
    baseline_version: String,
}

impl ActiveClassifier {
    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    /// Classify one ward's features, returning the result and the version
    /// tag to record with it
    pub fn classify(&self, ward_id: Uuid, features: &FeatureVector) -> (Classification, &str) {
        if let Some(loaded) = &self.trained {
            match loaded.model.classify(features) {
                Ok(c) => return (c, &self.version),
                Err(e) => {
                    tracing::warn!(%ward_id, error = %e, "Trained inference failed, using baseline");
                }
            }
        }
        (self.baseline.classify(features), &self.baseline_version)
    }
}

/// Result of a training request. Failures are reported, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub success: bool,
    /// True when an artifact already existed and `force` was not set
    pub skipped: bool,
    pub reason: Option<String>,
    pub variant: String,
    pub model_version: String,
    pub source: TrainingSource,
    pub samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub class_distribution: [usize; CLASS_COUNT],
    pub metrics: Option<EvaluationMetrics>,
    pub trained_at: Option<DateTime<Utc>>,
}

impl TrainingOutcome {
    fn new(variant: &ModelVariant) -> Self {
        Self {
            success: false,
            skipped: false,
            reason: None,
            variant: variant.name.clone(),
            model_version: variant.version.clone(),
            source: variant.source,
            samples: 0,
            train_samples: 0,
            test_samples: 0,
            class_distribution: [0; CLASS_COUNT],
            metrics: None,
            trained_at: None,
        }
    }

    fn failed(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!(variant = %self.variant, %reason, "Model training failed");
        self.success = false;
        self.reason = Some(reason);
        self
    }
}

/// Status of the active model, as reported by the API
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub variant: String,
    pub model_version: String,
    pub fallback_profile: &'static str,
    pub source: TrainingSource,
    pub trained_model_loaded: bool,
    pub metadata: Option<ArtifactMetadata>,
}

pub struct ModelService {
    variant: ModelVariant,
    artifacts: Arc<dyn ArtifactRepository>,
    training_data: Arc<dyn TrainingDataStore>,
    weather: Arc<dyn WeatherStore>,
    baseline: BaselineClassifier,
    cache: RwLock<Option<Arc<LoadedModel>>>,
    training: Mutex<()>,
}

impl ModelService {
    pub fn new(
        variant: ModelVariant,
        artifacts: Arc<dyn ArtifactRepository>,
        training_data: Arc<dyn TrainingDataStore>,
        weather: Arc<dyn WeatherStore>,
    ) -> Self {
        let baseline = BaselineClassifier::for_profile(variant.profile);
        Self {
            variant,
            artifacts,
            training_data,
            weather,
            baseline,
            cache: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    pub fn variant(&self) -> &ModelVariant {
        &self.variant
    }

    /// The cached model, loading it from the repository on first use.
    /// Missing or corrupt artifacts yield `None`.
    pub async fn loaded_model(&self) -> Option<Arc<LoadedModel>> {
        if let Some(model) = self.cache.read().await.as_ref() {
            return Some(model.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(model) = cache.as_ref() {
            return Some(model.clone());
        }

        match self.artifacts.load(&self.variant.version).await {
            Ok(Some(bundle)) => {
                tracing::info!(version = %self.variant.version, "Loaded trained model");
                let model = Arc::new(LoadedModel {
                    model: bundle.model,
                    metadata: bundle.metadata,
                });
                *cache = Some(model.clone());
                Some(model)
            }
            Ok(None) => {
                tracing::warn!(
                    version = %self.variant.version,
                    "No trained model artifact, predictions will use the baseline"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    version = %self.variant.version,
                    error = %e,
                    "Could not load model artifact, predictions will use the baseline"
                );
                None
            }
        }
    }

    /// Snapshot of the classifier to use for a cycle
    pub async fn active_classifier(&self) -> ActiveClassifier {
        ActiveClassifier {
            trained: self.loaded_model().await,
            baseline: self.baseline,
            version: self.variant.version.clone(),
            baseline_version: self.variant.baseline_version(),
        }
    }

    /// Classify a single feature vector with the current model
    pub async fn classify(&self, ward_id: Uuid, features: &FeatureVector) -> (Classification, String) {
        let active = self.active_classifier().await;
        let (classification, version) = active.classify(ward_id, features);
        (classification, version.to_string())
    }

    pub async fn status(&self) -> ModelStatus {
        let loaded = self.loaded_model().await;
        ModelStatus {
            variant: self.variant.name.clone(),
            model_version: self.variant.version.clone(),
            fallback_profile: self.variant.profile.as_str(),
            source: self.variant.source,
            trained_model_loaded: loaded.is_some(),
            metadata: loaded.map(|m| m.metadata.clone()),
        }
    }

    /// Train only when no artifact exists for this version
    pub async fn ensure_trained(&self) -> Option<TrainingOutcome> {
        if self.artifacts.exists(&self.variant.version).await {
            return None;
        }
        Some(self.train(false).await)
    }

    /// Fit the variant's ensemble on its training source and persist it.
    ///
    /// Without `force`, an existing artifact is kept and reported as skipped.
    /// On any failure the stored artifact and the cache are left untouched.
    pub async fn train(&self, force: bool) -> TrainingOutcome {
        let _guard = self.training.lock().await;
        let mut outcome = TrainingOutcome::new(&self.variant);

        if !force && self.artifacts.exists(&self.variant.version).await {
            tracing::info!(version = %self.variant.version, "Model already trained, skipping");
            outcome.success = true;
            outcome.skipped = true;
            outcome.reason = Some("model already trained".to_string());
            return outcome;
        }

        tracing::info!(
            variant = %self.variant.name,
            source = self.variant.source.as_str(),
            "Training risk model"
        );

        let data = match self.collect_dataset().await {
            Ok(data) => data,
            Err(reason) => return outcome.failed(reason),
        };
        outcome.samples = data.len();
        outcome.class_distribution = data.class_counts();

        let params = self.variant.ensemble;
        let min_samples = self.variant.source.min_samples();
        let fitted = tokio::task::spawn_blocking(move || training::train(&data, &params, min_samples)).await;

        let report = match fitted {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => return outcome.failed(e.to_string()),
            Err(e) => return outcome.failed(format!("training task aborted: {}", e)),
        };

        let trained_at = Utc::now();
        let bundle = ArtifactBundle {
            model: report.model,
            metadata: ArtifactMetadata {
                variant: self.variant.name.clone(),
                version: self.variant.version.clone(),
                trained_at,
                train_samples: report.train_samples,
                test_samples: report.test_samples,
                metrics: report.metrics.clone(),
            },
        };

        if let Err(e) = self.artifacts.save(&self.variant.version, &bundle).await {
            return outcome.failed(format!("could not save artifact: {}", e));
        }

        *self.cache.write().await = Some(Arc::new(LoadedModel {
            model: bundle.model,
            metadata: bundle.metadata,
        }));

        tracing::info!(
            version = %self.variant.version,
            accuracy = report.metrics.accuracy,
            precision = report.metrics.precision,
            recall = report.metrics.recall,
            f1 = report.metrics.f1,
            train_samples = report.train_samples,
            test_samples = report.test_samples,
            "Model training completed"
        );

        outcome.success = true;
        outcome.train_samples = report.train_samples;
        outcome.test_samples = report.test_samples;
        outcome.metrics = Some(report.metrics);
        outcome.trained_at = Some(trained_at);
        outcome
    }

    async fn collect_dataset(&self) -> Result<Dataset, String> {
        match self.variant.source {
            TrainingSource::Synthetic => Ok(synthetic_dataset()),
            TrainingSource::LiveSample => {
                let observations = self
                    .weather
                    .recent_with_rainfall(LIVE_SAMPLE_LIMIT)
                    .await
                    .map_err(|e| format!("could not read weather observations: {}", e))?;
                Ok(live_sample_dataset(&observations, self.variant.profile))
            }
            TrainingSource::Historical => {
                let records = self
                    .training_data
                    .historical_records()
                    .await
                    .map_err(|e| format!("could not read historical records: {}", e))?;
                Ok(historical_dataset(&records, self.variant.profile))
            }
        }
    }
}
