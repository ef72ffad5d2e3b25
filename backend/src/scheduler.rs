//! Periodic prediction cycles

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::PredictionCycle;

/// Run `ensure_trained` and a prediction cycle every `interval`, starting
/// immediately. Failures are logged and the loop keeps going.
pub fn spawn(cycle: PredictionCycle, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = interval.as_secs(), "Prediction scheduler started");

        loop {
            ticker.tick().await;
            run_once(&cycle).await;
        }
    })
}

async fn run_once(cycle: &PredictionCycle) {
    if let Some(outcome) = cycle.model().ensure_trained().await {
        if !outcome.success {
            tracing::warn!(
                reason = outcome.reason.as_deref().unwrap_or("unknown"),
                "Scheduled training failed, continuing with baseline"
            );
        }
    }

    match cycle.run(Utc::now()).await {
        Ok(summary) => tracing::info!(
            created = summary.predictions_created,
            transitions = summary.transitions,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scheduled prediction cycle finished"
        ),
        Err(e) => tracing::error!(error = %e, "Scheduled prediction cycle failed"),
    }
}
