//! Data Transfer Objects shared across routes.
//!
//! Resource-specific request bodies and query strings live next to their
//! handlers in `routes/`; this module holds the response envelope and the
//! request/sample shapes used by more than one route.

use chrono::{DateTime, Utc};
use lp_core::db::PaginatedResult;
use lp_core::{Request, RequestWithSamples, TestingSample};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// ============================================================================
// Envelope
// ============================================================================

/// Success envelope: `{ "success": true, "data": ... }`.
///
/// Plain lists carry `count`; paged lists carry `pagination`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            count: None,
            pagination: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            count: Some(data.len()),
            ..Self::ok(data)
        }
    }

    pub fn paginated<U>(page: PaginatedResult<U>) -> Self
    where
        T: From<U>,
    {
        let pagination = PaginationInfo {
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages,
        };
        Self {
            pagination: Some(pagination),
            ..Self::ok(page.items.into_iter().map(T::from).collect())
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// Body returned by delete endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
}

impl DeletedResponse {
    pub fn new(id: Uuid) -> Self {
        Self { id, deleted: true }
    }
}

// ============================================================================
// Requests and samples
// ============================================================================

/// A lab request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestResponse {
    pub id: Uuid,
    /// `{TYPE}-{CAPABILITY}-{YYMM}-{RUN}`, e.g. `NTR-RHE-2410-0007`.
    pub request_number: String,
    /// `ntr`, `asr` or `er`.
    pub request_type: String,
    pub capability_id: Uuid,
    /// Shared by every request split from one submission.
    pub submission_id: Uuid,
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub title: String,
    pub priority: String,
    pub status: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub equipment_id: Option<Uuid>,
    pub reservation_start: Option<DateTime<Utc>>,
    pub reservation_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Request> for RequestResponse {
    fn from(request: Request) -> Self {
        Self {
            id: request.id,
            request_number: request.request_number,
            request_type: request.request_type.as_db_str().to_string(),
            capability_id: request.capability_id,
            submission_id: request.submission_id,
            requester_id: request.requester_id,
            io_id: request.io_id,
            title: request.title,
            priority: request.priority.as_db_str().to_string(),
            status: request.status.as_db_str().to_string(),
            details: request.details,
            equipment_id: request.equipment_id,
            reservation_start: request.reservation_start,
            reservation_end: request.reservation_end,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// A request together with its testing samples.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestDetailResponse {
    #[serde(flatten)]
    pub request: RequestResponse,
    pub samples: Vec<SampleResponse>,
}

impl From<RequestWithSamples> for RequestDetailResponse {
    fn from(created: RequestWithSamples) -> Self {
        Self {
            request: created.request.into(),
            samples: created.samples.into_iter().map(Into::into).collect(),
        }
    }
}

/// A testing sample.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SampleResponse {
    pub id: Uuid,
    /// `{request_number}-S{NN}`.
    pub sample_code: String,
    pub request_id: Uuid,
    pub test_method_id: Option<Uuid>,
    pub name: String,
    pub sample_type: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub remarks: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TestingSample> for SampleResponse {
    fn from(sample: TestingSample) -> Self {
        Self {
            id: sample.id,
            sample_code: sample.sample_code,
            request_id: sample.request_id,
            test_method_id: sample.test_method_id,
            name: sample.name,
            sample_type: sample.sample_type,
            description: sample.description,
            status: sample.status.as_db_str().to_string(),
            remarks: sample.remarks,
            received_at: sample.received_at,
            completed_at: sample.completed_at,
            created_at: sample.created_at,
            updated_at: sample.updated_at,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses a snake_case enum value, reporting `field` on failure.
pub fn parse_enum<T: FromStr>(field: &str, value: &str, allowed: &[&str]) -> Result<T, ApiError> {
    value.parse().map_err(|_| {
        ApiError::validation_field(
            field,
            "invalid_value",
            &format!(
                "Invalid {} '{}'. Valid values: {}",
                field,
                value,
                allowed.join(", ")
            ),
        )
    })
}

/// Rejects text that is empty once trimmed, since handlers store the
/// trimmed value.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Deserializes a nullable field so that a missing key and an explicit
/// `null` can be told apart: absent is `None`, `null` is `Some(None)`.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) const REQUEST_TYPES: &[&str] = &["ntr", "asr", "er"];
pub(crate) const REQUEST_STATUSES: &[&str] =
    &["submitted", "in_progress", "completed", "rejected", "cancelled"];
pub(crate) const SAMPLE_STATUSES: &[&str] = &[
    "submitted",
    "received",
    "in_progress",
    "completed",
    "rejected",
    "cancelled",
];
pub(crate) const PRIORITIES: &[&str] = &["normal", "urgent"];
pub(crate) const EQUIPMENT_STATUSES: &[&str] = &["available", "in_use", "maintenance", "retired"];
pub(crate) const ROLES: &[&str] = &["researcher", "lab_staff", "admin"];
