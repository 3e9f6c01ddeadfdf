//! Requests: NTR, ASR and ER records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::TestingSample;

/// Kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Normal Test Request: catalog test methods on submitted samples.
    Ntr,
    /// Analysis Solution Request: open-ended analysis by one capability.
    Asr,
    /// Equipment Reservation: self-service booking of lab equipment.
    Er,
}

impl RequestType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RequestType::Ntr => "ntr",
            RequestType::Asr => "asr",
            RequestType::Er => "er",
        }
    }

    /// Prefix used in request numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            RequestType::Ntr => "NTR",
            RequestType::Asr => "ASR",
            RequestType::Er => "ER",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number_prefix())
    }
}

impl FromStr for RequestType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ntr" => Ok(RequestType::Ntr),
            "asr" => Ok(RequestType::Asr),
            "er" => Ok(RequestType::Er),
            _ => Err(()),
        }
    }
}

/// Request priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(()),
        }
    }
}

/// Lifecycle status of a request. Transitions live in [`crate::workflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Submitted,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::Cancelled
        )
    }

    /// Returns true while the request still holds lab resources.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(RequestStatus::Submitted),
            "in_progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" => Ok(RequestStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// A request record. One NTR submission may produce several of these,
/// one per capability, linked through `submission_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    /// Human-facing number, e.g. `NTR-RHE-2410-0007` (unique).
    pub request_number: String,
    pub request_type: RequestType,
    pub capability_id: Uuid,
    /// Shared by every request split from the same submission.
    pub submission_id: Uuid,
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub title: String,
    pub priority: Priority,
    pub status: RequestStatus,
    /// Type-specific fields (ASR problem statement, remarks, ...).
    pub details: serde_json::Value,
    /// Reserved equipment (ER only).
    pub equipment_id: Option<Uuid>,
    pub reservation_start: Option<DateTime<Utc>>,
    pub reservation_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request together with its testing samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestWithSamples {
    #[serde(flatten)]
    pub request: Request,
    pub samples: Vec<TestingSample>,
}

/// Filter for listing requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub request_type: Option<RequestType>,
    pub status: Option<RequestStatus>,
    pub capability_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub submission_id: Option<Uuid>,
    /// Matches request number or title.
    pub search: Option<String>,
}
