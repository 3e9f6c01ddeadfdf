//! Capability endpoints.

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
use lp_core::db::create_capability_repository;
use lp_core::models::{is_valid_short_name, Capability, CapabilityFilter, CapabilityUpdate};

// ============================================================================
// DTOs
// ============================================================================

/// A lab capability.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CapabilityResponse {
    pub id: Uuid,
    pub name: String,
    /// Code used in request numbers, e.g. `RHE`.
    pub short_name: String,
    pub description: Option<String>,
    /// Last run number handed out.
    pub req_run_no: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Capability> for CapabilityResponse {
    fn from(c: Capability) -> Self {
        Self {
            id: c.id,
            name: c.name,
            short_name: c.short_name,
            description: c.description,
            req_run_no: c.req_run_no,
            is_active: c.is_active,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCapabilityRequest {
    #[validate(length(min = 1, max = 100), custom(function = "crate::dto::not_blank"))]
    pub name: String,
    /// 2-6 uppercase letters or digits.
    #[validate(length(min = 2, max = 6))]
    pub short_name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCapabilityRequest {
    #[validate(length(min = 1, max = 100), custom(function = "crate::dto::not_blank"))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 6))]
    pub short_name: Option<String>,
    /// `null` clears the description.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListCapabilitiesQuery {
    pub is_active: Option<bool>,
    /// Matches name or short name.
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

fn checked_short_name(short_name: &str) -> Result<String, ApiError> {
    let short_name = short_name.trim().to_uppercase();
    if !is_valid_short_name(&short_name) {
        return Err(ApiError::validation_field(
            "short_name",
            "invalid_format",
            "Short name must be 2-6 uppercase letters or digits",
        ));
    }
    Ok(short_name)
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_capabilities).post(create_capability))
        .route(
            "/:id",
            get(get_capability)
                .put(update_capability)
                .delete(delete_capability),
        )
}

/// List capabilities.
#[utoipa::path(
    get,
    path = "/api/capabilities",
    params(
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Search name or short name")
    ),
    responses(
        (status = 200, description = "Capabilities", body = Vec<CapabilityResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Capabilities"
)]
async fn list_capabilities(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListCapabilitiesQuery>,
) -> Result<Json<ApiResponse<Vec<CapabilityResponse>>>, ApiError> {
    let repo = create_capability_repository(&state.db);
    let filter = CapabilityFilter {
        is_active: query.is_active,
        search: query.search,
    };

    let capabilities = repo.list(&filter).await?;
    Ok(Json(ApiResponse::list(
        capabilities.into_iter().map(Into::into).collect(),
    )))
}

/// Get a capability.
#[utoipa::path(
    get,
    path = "/api/capabilities/{id}",
    params(("id" = Uuid, Path, description = "Capability ID")),
    responses(
        (status = 200, description = "Capability", body = CapabilityResponse),
        (status = 404, description = "Capability not found", body = ErrorResponse)
    ),
    tag = "Capabilities"
)]
async fn get_capability(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<CapabilityResponse>>, ApiError> {
    let repo = create_capability_repository(&state.db);
    let capability = repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Capability", id))?;

    Ok(Json(ApiResponse::ok(capability.into())))
}

/// Create a capability. Its run counter starts at zero.
#[utoipa::path(
    post,
    path = "/api/capabilities",
    request_body = CreateCapabilityRequest,
    responses(
        (status = 201, description = "Capability created", body = CapabilityResponse),
        (status = 400, description = "Invalid input or duplicate short name", body = ErrorResponse)
    ),
    tag = "Capabilities"
)]
async fn create_capability(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateCapabilityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CapabilityResponse>>), ApiError> {
    let short_name = checked_short_name(&request.short_name)?;
    let repo = create_capability_repository(&state.db);

    if repo.get_by_short_name(&short_name).await?.is_some() {
        return Err(ApiError::validation_field(
            "short_name",
            "duplicate",
            &format!("Short name '{}' is already in use", short_name),
        ));
    }

    let mut capability = Capability::new(request.name.trim(), short_name);
    capability.description = request.description.filter(|d| !d.trim().is_empty());
    capability.is_active = request.is_active.unwrap_or(true);

    let created = repo.create(&capability).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Update a capability.
#[utoipa::path(
    put,
    path = "/api/capabilities/{id}",
    params(("id" = Uuid, Path, description = "Capability ID")),
    request_body = UpdateCapabilityRequest,
    responses(
        (status = 200, description = "Capability updated", body = CapabilityResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Capability not found", body = ErrorResponse)
    ),
    tag = "Capabilities"
)]
async fn update_capability(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCapabilityRequest>,
) -> Result<Json<ApiResponse<CapabilityResponse>>, ApiError> {
    let update = CapabilityUpdate {
        name: request.name.map(|n| n.trim().to_string()),
        short_name: request
            .short_name
            .as_deref()
            .map(checked_short_name)
            .transpose()?,
        description: request.description,
        is_active: request.is_active,
    };

    let repo = create_capability_repository(&state.db);
    let updated = repo.update(id, &update).await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}

/// Delete a capability. Fails while requests or catalog entries refer to it.
#[utoipa::path(
    delete,
    path = "/api/capabilities/{id}",
    params(("id" = Uuid, Path, description = "Capability ID")),
    responses(
        (status = 200, description = "Capability deleted", body = DeletedResponse),
        (status = 400, description = "Capability still referenced", body = ErrorResponse),
        (status = 404, description = "Capability not found", body = ErrorResponse)
    ),
    tag = "Capabilities"
)]
async fn delete_capability(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    let repo = create_capability_repository(&state.db);
    if !repo.delete(id).await? {
        return Err(ApiError::not_found("Capability", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
