//! Crowd-sourced flood report models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review status of a crowd report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Validated,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Validated => "validated",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "validated" => ReportStatus::Validated,
            "rejected" => ReportStatus::Rejected,
            _ => ReportStatus::Pending,
        }
    }
}

/// A flood report submitted by a resident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrowdReport {
    pub id: Uuid,
    pub ward_id: Uuid,
    /// Reviewer-assigned reliability, 0.0 to 1.0
    pub reliability_score: f64,
    pub upvotes: i32,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl CrowdReport {
    /// Severity on a 0-10 scale derived from reliability and community votes
    pub fn severity(&self) -> f64 {
        (self.reliability_score * 10.0 + f64::from(self.upvotes)).min(10.0)
    }

    pub fn is_validated(&self) -> bool {
        self.status == ReportStatus::Validated
    }
}
