//! Request endpoints: submission, listing and status workflow.
//!
//! NTR, ASR and ER submissions each have their own POST route. An NTR may
//! touch several capabilities and comes back as one request per capability.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    parse_enum, ApiResponse, DeletedResponse, RequestDetailResponse, RequestResponse,
    PRIORITIES, REQUEST_STATUSES, REQUEST_TYPES,
};
use crate::error::{ApiError, ErrorResponse};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::state::AppState;
use lp_core::db::{
    create_request_repository, create_sample_repository, Pagination,
};
use lp_core::models::{Priority, Request, RequestFilter, RequestStatus, RequestWithSamples};
use lp_core::submission::{AsrSubmission, ErSubmission, NtrLine, NtrSubmission, SampleDraft};

// ============================================================================
// DTOs
// ============================================================================

/// A sample as entered on the submission form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SampleInput {
    /// Unique within the submission.
    pub name: String,
    pub sample_type: Option<String>,
    pub description: Option<String>,
}

impl From<SampleInput> for SampleDraft {
    fn from(input: SampleInput) -> Self {
        SampleDraft {
            name: input.name.trim().to_string(),
            sample_type: input.sample_type,
            description: input.description,
        }
    }
}

/// A requested test method.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestMethodSelection {
    pub test_method_id: Uuid,
    /// Sample names to run this method on; omit for every sample.
    pub samples: Option<Vec<String>>,
    pub remarks: Option<String>,
}

impl From<TestMethodSelection> for NtrLine {
    fn from(selection: TestMethodSelection) -> Self {
        NtrLine {
            test_method_id: selection.test_method_id,
            samples: selection.samples,
            remarks: selection.remarks,
        }
    }
}

/// Normal Test Request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitNtrRequest {
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub title: String,
    /// `normal` (default) or `urgent`.
    pub priority: Option<String>,
    /// Free-form form fields stored with every split request.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    #[validate(length(min = 1, message = "At least one sample is required"))]
    pub samples: Vec<SampleInput>,
    #[validate(length(min = 1, message = "At least one test method is required"))]
    pub test_methods: Vec<TestMethodSelection>,
}

/// Analysis Solution Request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitAsrRequest {
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub capability_id: Uuid,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub title: String,
    pub priority: Option<String>,
    #[validate(length(min = 1, max = 5000), custom(function = "crate::dto::not_blank"))]
    pub problem_statement: String,
    #[validate(length(max = 5000))]
    pub objective: Option<String>,
    #[validate(length(min = 1, message = "At least one sample is required"))]
    pub samples: Vec<SampleInput>,
}

/// Equipment Reservation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitErRequest {
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub equipment_id: Uuid,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub title: String,
    pub reservation_start: DateTime<Utc>,
    pub reservation_end: DateTime<Utc>,
    #[validate(length(max = 2000))]
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRequestStatusRequest {
    /// Target status, e.g. `in_progress` or `cancelled`.
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListRequestsQuery {
    pub request_type: Option<String>,
    pub status: Option<String>,
    pub capability_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub submission_id: Option<Uuid>,
    /// Matches request number or title.
    #[validate(length(max = 100))]
    pub search: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 200))]
    pub per_page: Option<u32>,
}

fn parse_priority(priority: Option<&str>) -> Result<Priority, ApiError> {
    priority
        .map(|p| parse_enum("priority", p, PRIORITIES))
        .transpose()
        .map(Option::unwrap_or_default)
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests))
        .route("/ntr", post(submit_ntr))
        .route("/asr", post(submit_asr))
        .route("/er", post(submit_er))
        .route("/number/:request_number", get(get_request_by_number))
        .route("/:id", get(get_request).delete(delete_request))
        .route("/:id/status", patch(update_request_status))
}

/// List requests, newest first.
#[utoipa::path(
    get,
    path = "/api/requests",
    params(
        ("request_type" = Option<String>, Query, description = "ntr, asr or er"),
        ("status" = Option<String>, Query, description = "Request status"),
        ("capability_id" = Option<Uuid>, Query, description = "Capability"),
        ("requester_id" = Option<Uuid>, Query, description = "Requester"),
        ("submission_id" = Option<Uuid>, Query, description = "Requests split from one NTR"),
        ("search" = Option<String>, Query, description = "Search number or title"),
        ("page" = Option<u32>, Query, description = "Page number (1-indexed)"),
        ("per_page" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Page of requests", body = Vec<RequestResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn list_requests(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListRequestsQuery>,
) -> Result<Json<ApiResponse<Vec<RequestResponse>>>, ApiError> {
    let filter = RequestFilter {
        request_type: query
            .request_type
            .as_deref()
            .map(|t| parse_enum("request_type", t, REQUEST_TYPES))
            .transpose()?,
        status: query
            .status
            .as_deref()
            .map(|s| parse_enum("status", s, REQUEST_STATUSES))
            .transpose()?,
        capability_id: query.capability_id,
        requester_id: query.requester_id,
        submission_id: query.submission_id,
        search: query.search,
    };
    let pagination = Pagination::from_query(query.page, query.per_page);

    let page = create_request_repository(&state.db)
        .list(&filter, &pagination)
        .await?;
    Ok(Json(ApiResponse::paginated(page)))
}

async fn with_samples(state: &AppState, request: Request) -> Result<RequestDetailResponse, ApiError> {
    let samples = create_sample_repository(&state.db)
        .list_for_request(request.id)
        .await?;
    Ok(RequestWithSamples { request, samples }.into())
}

/// Get a request with its samples.
#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request with samples", body = RequestDetailResponse),
        (status = 404, description = "Request not found", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn get_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<RequestDetailResponse>>, ApiError> {
    let request = create_request_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Request", id))?;

    Ok(Json(ApiResponse::ok(with_samples(&state, request).await?)))
}

/// Look a request up by its number, e.g. `NTR-RHE-2410-0007`.
#[utoipa::path(
    get,
    path = "/api/requests/number/{request_number}",
    params(("request_number" = String, Path, description = "Request number")),
    responses(
        (status = 200, description = "Request with samples", body = RequestDetailResponse),
        (status = 404, description = "Request not found", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn get_request_by_number(
    State(state): State<AppState>,
    ApiPath(request_number): ApiPath<String>,
) -> Result<Json<ApiResponse<RequestDetailResponse>>, ApiError> {
    let request = create_request_repository(&state.db)
        .get_by_number(&request_number)
        .await?
        .ok_or_else(|| ApiError::not_found("Request", &request_number))?;

    Ok(Json(ApiResponse::ok(with_samples(&state, request).await?)))
}

/// Submit an NTR. Returns one request per capability touched.
#[utoipa::path(
    post,
    path = "/api/requests/ntr",
    request_body = SubmitNtrRequest,
    responses(
        (status = 201, description = "Requests created", body = Vec<RequestDetailResponse>),
        (status = 400, description = "Invalid submission", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn submit_ntr(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SubmitNtrRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<RequestDetailResponse>>>), ApiError> {
    let submission = NtrSubmission {
        requester_id: request.requester_id,
        io_id: request.io_id,
        title: request.title.trim().to_string(),
        priority: parse_priority(request.priority.as_deref())?,
        details: request.details.unwrap_or_default(),
        samples: request.samples.into_iter().map(Into::into).collect(),
        lines: request.test_methods.into_iter().map(Into::into).collect(),
    };

    let created = create_request_repository(&state.db)
        .submit_ntr(&submission)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::list(
            created.into_iter().map(Into::into).collect(),
        )),
    ))
}

/// Submit an ASR to one capability.
#[utoipa::path(
    post,
    path = "/api/requests/asr",
    request_body = SubmitAsrRequest,
    responses(
        (status = 201, description = "Request created", body = RequestDetailResponse),
        (status = 400, description = "Invalid submission", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn submit_asr(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SubmitAsrRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RequestDetailResponse>>), ApiError> {
    let submission = AsrSubmission {
        requester_id: request.requester_id,
        io_id: request.io_id,
        capability_id: request.capability_id,
        title: request.title.trim().to_string(),
        priority: parse_priority(request.priority.as_deref())?,
        problem_statement: request.problem_statement,
        objective: request.objective,
        samples: request.samples.into_iter().map(Into::into).collect(),
    };

    let created = create_request_repository(&state.db)
        .submit_asr(&submission)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Reserve a piece of equipment.
#[utoipa::path(
    post,
    path = "/api/requests/er",
    request_body = SubmitErRequest,
    responses(
        (status = 201, description = "Reservation created", body = RequestResponse),
        (status = 400, description = "Invalid submission", body = ErrorResponse),
        (status = 409, description = "Equipment already reserved in that window", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn submit_er(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SubmitErRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RequestResponse>>), ApiError> {
    let submission = ErSubmission {
        requester_id: request.requester_id,
        io_id: request.io_id,
        equipment_id: request.equipment_id,
        title: request.title.trim().to_string(),
        reservation_start: request.reservation_start,
        reservation_end: request.reservation_end,
        purpose: request.purpose,
    };

    let created = create_request_repository(&state.db)
        .submit_er(&submission)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Move a request through the workflow. Rejecting or cancelling also
/// closes its open samples.
#[utoipa::path(
    patch,
    path = "/api/requests/{id}/status",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = UpdateRequestStatusRequest,
    responses(
        (status = 200, description = "Request updated", body = RequestDetailResponse),
        (status = 400, description = "Invalid status or transition", body = ErrorResponse),
        (status = 404, description = "Request not found", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn update_request_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateRequestStatusRequest>,
) -> Result<Json<ApiResponse<RequestDetailResponse>>, ApiError> {
    let status: RequestStatus = parse_enum("status", &request.status, REQUEST_STATUSES)?;
    let span = lp_observability::request_span!(id, target_status = %status);

    async {
        let updated = create_request_repository(&state.db)
            .update_status(id, status)
            .await?;
        let detail = with_samples(&state, updated).await?;
        Ok::<_, ApiError>(Json(ApiResponse::ok(detail)))
    }
    .instrument(span)
    .await
}

/// Delete a request and its samples.
#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request deleted", body = DeletedResponse),
        (status = 404, description = "Request not found", body = ErrorResponse)
    ),
    tag = "Requests"
)]
async fn delete_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !create_request_repository(&state.db).delete(id).await? {
        return Err(ApiError::not_found("Request", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
