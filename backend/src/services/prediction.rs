//! Prediction cycle orchestration
//!
//! One cycle lists every ward, builds features, classifies, appends a
//! prediction to the audit log and overwrites the ward's risk level when it
//! changed. Wards are evaluated concurrently under a semaphore; a ward whose
//! lookups fail or time out is skipped without affecting the others.
//!
//! The per-ward timeout bounds the feature reads only. Once features exist
//! the ward is always recorded and its transition event always sent, so an
//! overwrite can never happen without a matching event.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    validate_confidence, validate_feature_vector, validate_prediction_window,
    validate_probabilities, FeatureVector, PredictionMethod, RiskPrediction, Ward, WardRiskChanged,
};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::config::CycleConfig;
use crate::error::{AppError, AppResult};
use crate::services::{ActiveClassifier, FeatureService, ModelService};
use crate::stores::{PredictionStore, WardRegistry};

/// Totals for one cycle
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CycleSummary {
    pub wards_total: usize,
    pub predictions_created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub transitions: usize,
    pub trained_predictions: usize,
    pub baseline_predictions: usize,
    pub model_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
enum WardOutcome {
    Recorded {
        method: PredictionMethod,
        transitioned: bool,
    },
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct PredictionCycle {
    wards: Arc<dyn WardRegistry>,
    predictions: Arc<dyn PredictionStore>,
    features: FeatureService,
    model: Arc<ModelService>,
    events: mpsc::Sender<WardRiskChanged>,
    max_concurrency: usize,
    ward_timeout: Duration,
}

impl PredictionCycle {
    pub fn new(
        wards: Arc<dyn WardRegistry>,
        predictions: Arc<dyn PredictionStore>,
        features: FeatureService,
        model: Arc<ModelService>,
        events: mpsc::Sender<WardRiskChanged>,
        config: &CycleConfig,
    ) -> Self {
        Self {
            wards,
            predictions,
            features,
            model,
            events,
            max_concurrency: config.max_concurrency.max(1),
            ward_timeout: config.ward_timeout(),
        }
    }

    pub fn model(&self) -> &Arc<ModelService> {
        &self.model
    }

    /// Run one cycle evaluated at `now`. Only a failure to list wards fails
    /// the cycle; per-ward problems are counted in the summary.
    pub async fn run(&self, now: DateTime<Utc>) -> AppResult<CycleSummary> {
        let started_at = Utc::now();
        let wards = self.wards.list_wards().await.map_err(|e| {
            tracing::error!(error = %e, "Could not list wards, aborting prediction cycle");
            AppError::CycleFailed(e.to_string())
        })?;

        let classifier = Arc::new(self.model.active_classifier().await);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        tracing::info!(
            wards = wards.len(),
            trained = classifier.is_trained(),
            max_concurrency = self.max_concurrency,
            "Starting prediction cycle"
        );

        let mut summary = CycleSummary {
            wards_total: wards.len(),
            predictions_created: 0,
            skipped: 0,
            failed: 0,
            transitions: 0,
            trained_predictions: 0,
            baseline_predictions: 0,
            model_version: self.model.variant().version.clone(),
            started_at,
            finished_at: started_at,
        };

        let mut tasks = JoinSet::new();
        for ward in wards {
            let cycle = self.clone();
            let classifier = classifier.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return WardOutcome::Failed;
                };
                let Some(features) = cycle.gather_features(&ward, now).await else {
                    return WardOutcome::Skipped;
                };
                cycle.record(ward, features, &classifier, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(WardOutcome::Recorded {
                    method,
                    transitioned,
                }) => {
                    summary.predictions_created += 1;
                    match method {
                        PredictionMethod::Trained => summary.trained_predictions += 1,
                        PredictionMethod::Baseline => summary.baseline_predictions += 1,
                    }
                    if transitioned {
                        summary.transitions += 1;
                    }
                }
                Ok(WardOutcome::Skipped) => summary.skipped += 1,
                Ok(WardOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Ward evaluation task panicked");
                    summary.failed += 1;
                }
            }
        }

        summary.finished_at = Utc::now();
        tracing::info!(
            wards = summary.wards_total,
            created = summary.predictions_created,
            skipped = summary.skipped,
            failed = summary.failed,
            transitions = summary.transitions,
            trained = summary.trained_predictions,
            baseline = summary.baseline_predictions,
            "Prediction cycle completed"
        );
        Ok(summary)
    }

    /// Feature reads for one ward, bounded by the ward timeout
    async fn gather_features(&self, ward: &Ward, now: DateTime<Utc>) -> Option<FeatureVector> {
        match tokio::time::timeout(self.ward_timeout, self.features.features_for(ward.id, now)).await
        {
            Ok(Ok(features)) => Some(features),
            Ok(Err(e)) => {
                tracing::warn!(ward_id = %ward.id, ward = %ward.name, error = %e, "Feature lookup failed, skipping ward");
                None
            }
            Err(_) => {
                tracing::warn!(ward_id = %ward.id, ward = %ward.name, "Feature lookup timed out, skipping ward");
                None
            }
        }
    }

    async fn record(
        &self,
        ward: Ward,
        features: FeatureVector,
        classifier: &ActiveClassifier,
        now: DateTime<Utc>,
    ) -> WardOutcome {
        let (classification, version) = classifier.classify(ward.id, &features);
        let prediction = RiskPrediction::new(ward.id, &classification, features, version, now);
        if let Err(reason) = check_prediction(&prediction) {
            tracing::error!(ward_id = %ward.id, reason, "Refusing to record invalid prediction");
            return WardOutcome::Failed;
        }

        if let Err(e) = self.predictions.insert_prediction(&prediction).await {
            tracing::error!(ward_id = %ward.id, error = %e, "Could not record prediction");
            return WardOutcome::Failed;
        }

        tracing::debug!(
            ward = %ward.name,
            level = %prediction.predicted_level,
            confidence = prediction.confidence,
            method = prediction.method.as_str(),
            "Prediction recorded"
        );

        let transitioned = prediction.predicted_level != ward.current_risk_level;
        if transitioned {
            if let Err(e) = self
                .wards
                .update_risk_level(ward.id, prediction.predicted_level, now)
                .await
            {
                tracing::error!(ward_id = %ward.id, error = %e, "Could not update ward risk level");
                return WardOutcome::Failed;
            }

            let event = WardRiskChanged {
                ward_id: ward.id,
                ward_name: ward.name.clone(),
                old: ward.current_risk_level,
                new: prediction.predicted_level,
                at: now,
                prediction_id: Some(prediction.id),
            };
            // Waits for channel capacity; a slow dispatcher delays the cycle
            // rather than losing the transition.
            if self.events.send(event).await.is_err() {
                tracing::debug!(ward_id = %ward.id, "No alert dispatcher listening");
            }
        }

        WardOutcome::Recorded {
            method: prediction.method,
            transitioned,
        }
    }
}

/// Well-formedness of a prediction before it enters the audit log.
/// Baseline distributions are display-only and not normalized.
fn check_prediction(prediction: &RiskPrediction) -> Result<(), &'static str> {
    validate_feature_vector(&prediction.features_used)?;
    validate_confidence(prediction.confidence)?;
    validate_prediction_window(prediction.valid_from, prediction.valid_until)?;
    if prediction.method == PredictionMethod::Trained {
        validate_probabilities(&prediction.probabilities)?;
    }
    Ok(())
}
