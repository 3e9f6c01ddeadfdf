//! Internal order (IO) endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{nullable, ApiResponse, DeletedResponse};
use crate::error::{ApiError, ErrorResponse};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::state::AppState;
use lp_core::db::create_io_repository;
use lp_core::models::{Io, IoFilter, IoUpdate};

/// An internal order that requests are charged to.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IoResponse {
    pub id: Uuid,
    pub io_number: String,
    pub name: String,
    pub responsible: Option<String>,
    pub cost_center: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Io> for IoResponse {
    fn from(io: Io) -> Self {
        Self {
            id: io.id,
            io_number: io.io_number,
            name: io.name,
            responsible: io.responsible,
            cost_center: io.cost_center,
            is_active: io.is_active,
            created_at: io.created_at,
            updated_at: io.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateIoRequest {
    #[validate(length(min = 1, max = 50), custom(function = "crate::dto::not_blank"))]
    pub io_number: String,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub name: String,
    pub responsible: Option<String>,
    #[validate(length(max = 50))]
    pub cost_center: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateIoRequest {
    #[validate(length(min = 1, max = 50), custom(function = "crate::dto::not_blank"))]
    pub io_number: Option<String>,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub responsible: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub cost_center: Option<Option<String>>,
    /// Inactive IOs cannot be charged by new requests.
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListIosQuery {
    pub is_active: Option<bool>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ios).post(create_io))
        .route("/:id", get(get_io).put(update_io).delete(delete_io))
}

/// List IOs.
#[utoipa::path(
    get,
    path = "/api/ios",
    params(
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Search IO number or name")
    ),
    responses((status = 200, description = "IOs", body = Vec<IoResponse>)),
    tag = "IOs"
)]
async fn list_ios(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListIosQuery>,
) -> Result<Json<ApiResponse<Vec<IoResponse>>>, ApiError> {
    let filter = IoFilter {
        is_active: query.is_active,
        search: query.search,
    };

    let ios = create_io_repository(&state.db).list(&filter).await?;
    Ok(Json(ApiResponse::list(
        ios.into_iter().map(Into::into).collect(),
    )))
}

/// Get an IO.
#[utoipa::path(
    get,
    path = "/api/ios/{id}",
    params(("id" = Uuid, Path, description = "IO ID")),
    responses(
        (status = 200, description = "IO", body = IoResponse),
        (status = 404, description = "IO not found", body = ErrorResponse)
    ),
    tag = "IOs"
)]
async fn get_io(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<IoResponse>>, ApiError> {
    let io = create_io_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("IO", id))?;

    Ok(Json(ApiResponse::ok(io.into())))
}

/// Create an IO.
#[utoipa::path(
    post,
    path = "/api/ios",
    request_body = CreateIoRequest,
    responses(
        (status = 201, description = "IO created", body = IoResponse),
        (status = 400, description = "Invalid input or duplicate IO number", body = ErrorResponse)
    ),
    tag = "IOs"
)]
async fn create_io(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateIoRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IoResponse>>), ApiError> {
    let mut io = Io::new(request.io_number.trim(), request.name.trim());
    io.responsible = request.responsible;
    io.cost_center = request.cost_center;
    io.is_active = request.is_active.unwrap_or(true);

    let created = create_io_repository(&state.db).create(&io).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Update an IO.
#[utoipa::path(
    put,
    path = "/api/ios/{id}",
    params(("id" = Uuid, Path, description = "IO ID")),
    request_body = UpdateIoRequest,
    responses(
        (status = 200, description = "IO updated", body = IoResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "IO not found", body = ErrorResponse)
    ),
    tag = "IOs"
)]
async fn update_io(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateIoRequest>,
) -> Result<Json<ApiResponse<IoResponse>>, ApiError> {
    let update = IoUpdate {
        io_number: request.io_number.map(|n| n.trim().to_string()),
        name: request.name.map(|n| n.trim().to_string()),
        responsible: request.responsible,
        cost_center: request.cost_center,
        is_active: request.is_active,
    };

    let updated = create_io_repository(&state.db).update(id, &update).await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}

/// Delete an IO.
#[utoipa::path(
    delete,
    path = "/api/ios/{id}",
    params(("id" = Uuid, Path, description = "IO ID")),
    responses(
        (status = 200, description = "IO deleted", body = DeletedResponse),
        (status = 400, description = "IO still referenced", body = ErrorResponse),
        (status = 404, description = "IO not found", body = ErrorResponse)
    ),
    tag = "IOs"
)]
async fn delete_io(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !create_io_repository(&state.db).delete(id).await? {
        return Err(ApiError::not_found("IO", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
