//! Testing samples: one physical sample under one test method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a testing sample. Transitions live in [`crate::workflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    #[default]
    Submitted,
    /// Physically received by the lab.
    Received,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

impl SampleStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SampleStatus::Submitted => "submitted",
            SampleStatus::Received => "received",
            SampleStatus::InProgress => "in_progress",
            SampleStatus::Completed => "completed",
            SampleStatus::Rejected => "rejected",
            SampleStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SampleStatus::Completed | SampleStatus::Rejected | SampleStatus::Cancelled
        )
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SampleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(SampleStatus::Submitted),
            "received" => Ok(SampleStatus::Received),
            "in_progress" => Ok(SampleStatus::InProgress),
            "completed" => Ok(SampleStatus::Completed),
            "rejected" => Ok(SampleStatus::Rejected),
            "cancelled" => Ok(SampleStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// A testing sample belonging to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingSample {
    pub id: Uuid,
    /// `{request_number}-S{NN}` (unique).
    pub sample_code: String,
    pub request_id: Uuid,
    /// Catalog method; `None` for ASR samples.
    pub test_method_id: Option<Uuid>,
    pub name: String,
    pub sample_type: Option<String>,
    pub description: Option<String>,
    pub status: SampleStatus,
    pub remarks: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing testing samples.
#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    pub request_id: Option<Uuid>,
    pub status: Option<SampleStatus>,
    pub test_method_id: Option<Uuid>,
}
