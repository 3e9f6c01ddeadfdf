//! Equipment endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{nullable, parse_enum, ApiResponse, DeletedResponse, EQUIPMENT_STATUSES};
use crate::error::{ApiError, ErrorResponse};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::state::AppState;
use lp_core::db::create_equipment_repository;
use lp_core::models::{Equipment, EquipmentFilter, EquipmentStatus, EquipmentUpdate};

/// A lab instrument.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EquipmentResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub capability_id: Uuid,
    pub location_id: Option<Uuid>,
    /// `available`, `in_use`, `maintenance` or `retired`.
    pub status: String,
    /// Whether researchers may book it through an ER.
    pub reservable: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Equipment> for EquipmentResponse {
    fn from(e: Equipment) -> Self {
        Self {
            id: e.id,
            code: e.code,
            name: e.name,
            capability_id: e.capability_id,
            location_id: e.location_id,
            status: e.status.as_db_str().to_string(),
            reservable: e.reservable,
            description: e.description,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipmentRequest {
    #[validate(length(min = 1, max = 50), custom(function = "crate::dto::not_blank"))]
    pub code: String,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub name: String,
    pub capability_id: Uuid,
    pub location_id: Option<Uuid>,
    pub status: Option<String>,
    pub reservable: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipmentRequest {
    #[validate(length(min = 1, max = 50), custom(function = "crate::dto::not_blank"))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub name: Option<String>,
    pub capability_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub location_id: Option<Option<Uuid>>,
    pub status: Option<String>,
    pub reservable: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListEquipmentQuery {
    pub capability_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub status: Option<String>,
    pub reservable: Option<bool>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

fn parse_status(status: &str) -> Result<EquipmentStatus, ApiError> {
    parse_enum("status", status, EQUIPMENT_STATUSES)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_equipment).post(create_equipment))
        .route(
            "/:id",
            get(get_equipment)
                .put(update_equipment)
                .delete(delete_equipment),
        )
}

/// List equipment.
#[utoipa::path(
    get,
    path = "/api/equipment",
    params(
        ("capability_id" = Option<Uuid>, Query, description = "Owning capability"),
        ("location_id" = Option<Uuid>, Query, description = "Location"),
        ("status" = Option<String>, Query, description = "Equipment status"),
        ("reservable" = Option<bool>, Query, description = "Bookable through an ER"),
        ("search" = Option<String>, Query, description = "Search code or name")
    ),
    responses(
        (status = 200, description = "Equipment", body = Vec<EquipmentResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    tag = "Equipment"
)]
async fn list_equipment(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListEquipmentQuery>,
) -> Result<Json<ApiResponse<Vec<EquipmentResponse>>>, ApiError> {
    let filter = EquipmentFilter {
        capability_id: query.capability_id,
        location_id: query.location_id,
        status: query.status.as_deref().map(parse_status).transpose()?,
        reservable: query.reservable,
        search: query.search,
    };

    let equipment = create_equipment_repository(&state.db).list(&filter).await?;
    Ok(Json(ApiResponse::list(
        equipment.into_iter().map(Into::into).collect(),
    )))
}

/// Get one piece of equipment.
#[utoipa::path(
    get,
    path = "/api/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment", body = EquipmentResponse),
        (status = 404, description = "Equipment not found", body = ErrorResponse)
    ),
    tag = "Equipment"
)]
async fn get_equipment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<EquipmentResponse>>, ApiError> {
    let equipment = create_equipment_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Equipment", id))?;

    Ok(Json(ApiResponse::ok(equipment.into())))
}

/// Register equipment.
#[utoipa::path(
    post,
    path = "/api/equipment",
    request_body = CreateEquipmentRequest,
    responses(
        (status = 201, description = "Equipment created", body = EquipmentResponse),
        (status = 400, description = "Invalid input, unknown capability or duplicate code", body = ErrorResponse)
    ),
    tag = "Equipment"
)]
async fn create_equipment(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateEquipmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EquipmentResponse>>), ApiError> {
    let mut equipment = Equipment::new(
        request.code.trim(),
        request.name.trim(),
        request.capability_id,
    );
    equipment.location_id = request.location_id;
    if let Some(status) = request.status.as_deref() {
        equipment.status = parse_status(status)?;
    }
    equipment.reservable = request.reservable.unwrap_or(false);
    equipment.description = request.description;

    let created = create_equipment_repository(&state.db)
        .create(&equipment)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Update equipment.
#[utoipa::path(
    put,
    path = "/api/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = UpdateEquipmentRequest,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Equipment not found", body = ErrorResponse)
    ),
    tag = "Equipment"
)]
async fn update_equipment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateEquipmentRequest>,
) -> Result<Json<ApiResponse<EquipmentResponse>>, ApiError> {
    let update = EquipmentUpdate {
        code: request.code.map(|c| c.trim().to_string()),
        name: request.name.map(|n| n.trim().to_string()),
        capability_id: request.capability_id,
        location_id: request.location_id,
        status: request.status.as_deref().map(parse_status).transpose()?,
        reservable: request.reservable,
        description: request.description,
    };

    let updated = create_equipment_repository(&state.db)
        .update(id, &update)
        .await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}

/// Delete equipment.
#[utoipa::path(
    delete,
    path = "/api/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment deleted", body = DeletedResponse),
        (status = 400, description = "Equipment still referenced", body = ErrorResponse),
        (status = 404, description = "Equipment not found", body = ErrorResponse)
    ),
    tag = "Equipment"
)]
async fn delete_equipment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !create_equipment_repository(&state.db).delete(id).await? {
        return Err(ApiError::not_found("Equipment", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
