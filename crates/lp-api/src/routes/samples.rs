//! Testing sample endpoints.

use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{parse_enum, ApiResponse, SampleResponse, SAMPLE_STATUSES};
use crate::error::{ApiError, ErrorResponse};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::state::AppState;
use lp_core::db::create_sample_repository;
use lp_core::models::{SampleFilter, SampleStatus};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSampleStatusRequest {
    /// Target status, e.g. `received` or `completed`.
    pub status: String,
    /// Replaces the sample's remarks when given.
    #[validate(length(max = 2000))]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListSamplesQuery {
    pub request_id: Option<Uuid>,
    pub status: Option<String>,
    pub test_method_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_samples))
        .route("/:id", get(get_sample))
        .route("/:id/status", patch(update_sample_status))
}

/// List testing samples.
#[utoipa::path(
    get,
    path = "/api/samples",
    params(
        ("request_id" = Option<Uuid>, Query, description = "Owning request"),
        ("status" = Option<String>, Query, description = "Sample status"),
        ("test_method_id" = Option<Uuid>, Query, description = "Test method")
    ),
    responses(
        (status = 200, description = "Samples", body = Vec<SampleResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    tag = "Samples"
)]
async fn list_samples(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListSamplesQuery>,
) -> Result<Json<ApiResponse<Vec<SampleResponse>>>, ApiError> {
    let filter = SampleFilter {
        request_id: query.request_id,
        status: query
            .status
            .as_deref()
            .map(|s| parse_enum("status", s, SAMPLE_STATUSES))
            .transpose()?,
        test_method_id: query.test_method_id,
    };

    let samples = create_sample_repository(&state.db).list(&filter).await?;
    Ok(Json(ApiResponse::list(
        samples.into_iter().map(Into::into).collect(),
    )))
}

/// Get a testing sample.
#[utoipa::path(
    get,
    path = "/api/samples/{id}",
    params(("id" = Uuid, Path, description = "Sample ID")),
    responses(
        (status = 200, description = "Sample", body = SampleResponse),
        (status = 404, description = "Sample not found", body = ErrorResponse)
    ),
    tag = "Samples"
)]
async fn get_sample(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<SampleResponse>>, ApiError> {
    let sample = create_sample_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sample", id))?;

    Ok(Json(ApiResponse::ok(sample.into())))
}

/// Move a sample through the workflow. The parent request follows:
/// it starts once work begins and closes when every sample is done.
#[utoipa::path(
    patch,
    path = "/api/samples/{id}/status",
    params(("id" = Uuid, Path, description = "Sample ID")),
    request_body = UpdateSampleStatusRequest,
    responses(
        (status = 200, description = "Sample updated", body = SampleResponse),
        (status = 400, description = "Invalid status or transition", body = ErrorResponse),
        (status = 404, description = "Sample not found", body = ErrorResponse)
    ),
    tag = "Samples"
)]
async fn update_sample_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateSampleStatusRequest>,
) -> Result<Json<ApiResponse<SampleResponse>>, ApiError> {
    let status: SampleStatus = parse_enum("status", &request.status, SAMPLE_STATUSES)?;

    let updated = create_sample_repository(&state.db)
        .update_status(id, status, request.remarks)
        .await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}
