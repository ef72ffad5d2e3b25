//! Ward and risk level models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flood risk level, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// All levels in class-index order
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Class index used by the classifier (0 = Low, 1 = Medium, 2 = High)
    pub fn index(&self) -> usize {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

/// An administrative ward tracked by the system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ward {
    pub id: Uuid,
    pub name: String,
    pub current_risk_level: RiskLevel,
    pub updated_at: DateTime<Utc>,
}

/// Emitted whenever a prediction cycle overwrites a ward's risk level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WardRiskChanged {
    pub ward_id: Uuid,
    pub ward_name: String,
    pub old: RiskLevel,
    pub new: RiskLevel,
    pub at: DateTime<Utc>,
    pub prediction_id: Option<Uuid>,
}

impl WardRiskChanged {
    /// True when the ward has just entered High risk
    pub fn is_escalation_to_high(&self) -> bool {
        self.new == RiskLevel::High && self.old != RiskLevel::High
    }
}
