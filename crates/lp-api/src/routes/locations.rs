//! Location endpoints.

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
use lp_core::db::create_location_repository;
use lp_core::models::{Location, LocationFilter, LocationUpdate};

/// A place where equipment stands.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationResponse {
    pub id: Uuid,
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Location> for LocationResponse {
    fn from(l: Location) -> Self {
        Self {
            id: l.id,
            name: l.name,
            building: l.building,
            floor: l.floor,
            room: l.room,
            description: l.description,
            is_active: l.is_active,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 100), custom(function = "crate::dto::not_blank"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub building: Option<String>,
    #[validate(length(max = 20))]
    pub floor: Option<String>,
    #[validate(length(max = 50))]
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Absent fields are left alone; `null` clears an optional field.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateLocationRequest {
    #[validate(length(min = 1, max = 100), custom(function = "crate::dto::not_blank"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub building: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub floor: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub room: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListLocationsQuery {
    pub is_active: Option<bool>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route(
            "/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
}

/// List locations.
#[utoipa::path(
    get,
    path = "/api/locations",
    params(
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Search name, building or room")
    ),
    responses((status = 200, description = "Locations", body = Vec<LocationResponse>)),
    tag = "Locations"
)]
async fn list_locations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListLocationsQuery>,
) -> Result<Json<ApiResponse<Vec<LocationResponse>>>, ApiError> {
    let repo = create_location_repository(&state.db);
    let filter = LocationFilter {
        is_active: query.is_active,
        search: query.search,
    };

    let locations = repo.list(&filter).await?;
    Ok(Json(ApiResponse::list(
        locations.into_iter().map(Into::into).collect(),
    )))
}

/// Get a location.
#[utoipa::path(
    get,
    path = "/api/locations/{id}",
    params(("id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location", body = LocationResponse),
        (status = 404, description = "Location not found", body = ErrorResponse)
    ),
    tag = "Locations"
)]
async fn get_location(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<LocationResponse>>, ApiError> {
    let location = create_location_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Location", id))?;

    Ok(Json(ApiResponse::ok(location.into())))
}

/// Create a location.
#[utoipa::path(
    post,
    path = "/api/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = LocationResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "Locations"
)]
async fn create_location(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateLocationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LocationResponse>>), ApiError> {
    let mut location = Location::new(request.name.trim());
    location.building = request.building;
    location.floor = request.floor;
    location.room = request.room;
    location.description = request.description;
    location.is_active = request.is_active.unwrap_or(true);

    let created = create_location_repository(&state.db)
        .create(&location)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Update a location.
#[utoipa::path(
    put,
    path = "/api/locations/{id}",
    params(("id" = Uuid, Path, description = "Location ID")),
    request_body = UpdateLocationRequest,
    responses(
        (status = 200, description = "Location updated", body = LocationResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Location not found", body = ErrorResponse)
    ),
    tag = "Locations"
)]
async fn update_location(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateLocationRequest>,
) -> Result<Json<ApiResponse<LocationResponse>>, ApiError> {
    let update = LocationUpdate {
        name: request.name.map(|n| n.trim().to_string()),
        building: request.building,
        floor: request.floor,
        room: request.room,
        description: request.description,
        is_active: request.is_active,
    };

    let updated = create_location_repository(&state.db)
        .update(id, &update)
        .await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}

/// Delete a location.
#[utoipa::path(
    delete,
    path = "/api/locations/{id}",
    params(("id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location deleted", body = DeletedResponse),
        (status = 400, description = "Location still referenced", body = ErrorResponse),
        (status = 404, description = "Location not found", body = ErrorResponse)
    ),
    tag = "Locations"
)]
async fn delete_location(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !create_location_repository(&state.db).delete(id).await? {
        return Err(ApiError::not_found("Location", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
