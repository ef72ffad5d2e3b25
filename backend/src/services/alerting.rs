//! Escalation alerts from ward risk transitions

use std::sync::Arc;

use shared::{Alert, WardRiskChanged};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::stores::{AlertStore, StoreResult};

/// Buffered transitions between the cycle and the dispatcher
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn event_channel() -> (mpsc::Sender<WardRiskChanged>, mpsc::Receiver<WardRiskChanged>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Records an alert for every transition into High risk
#[derive(Clone)]
pub struct AlertDispatcher {
    alerts: Arc<dyn AlertStore>,
}

impl AlertDispatcher {
    pub fn new(alerts: Arc<dyn AlertStore>) -> Self {
        Self { alerts }
    }

    /// Handle one transition. Returns the stored alert, if any.
    pub async fn handle(&self, event: &WardRiskChanged) -> StoreResult<Option<Alert>> {
        let Some(alert) = Alert::for_escalation(event) else {
            tracing::info!(
                ward = %event.ward_name,
                old = %event.old,
                new = %event.new,
                "Ward risk level changed"
            );
            return Ok(None);
        };

        self.alerts.insert_alert(&alert).await?;
        tracing::warn!(
            ward = %event.ward_name,
            ward_id = %event.ward_id,
            old = %event.old,
            alert_id = %alert.id,
            "High flood risk alert raised"
        );
        Ok(Some(alert))
    }

    /// Consume events until every sender is dropped
    pub async fn run(self, mut events: mpsc::Receiver<WardRiskChanged>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(&event).await {
                tracing::error!(ward_id = %event.ward_id, error = %e, "Could not record alert");
            }
        }
        tracing::debug!("Alert dispatcher stopped");
    }

    pub fn spawn(self, events: mpsc::Receiver<WardRiskChanged>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
