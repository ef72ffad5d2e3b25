use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{RiskLevel, WardRiskChanged};

/// A recorded escalation notice for a ward
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub ward_id: Uuid,
    pub risk_level: RiskLevel,
    pub message: String,
    pub prediction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Build the alert for an escalation; `None` for any other transition
    pub fn for_escalation(event: &WardRiskChanged) -> Option<Self> {
        if !event.is_escalation_to_high() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            ward_id: event.ward_id,
            risk_level: event.new,
            message: format!(
                "High flood risk detected for {}. Please take necessary precautions and move to higher ground.",
                event.ward_name
            ),
            prediction_id: event.prediction_id,
            created_at: event.at,
        })
    }
}
