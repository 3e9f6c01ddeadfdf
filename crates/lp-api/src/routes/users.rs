//! User endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{nullable, parse_enum, ApiResponse, DeletedResponse, ROLES};
use crate::error::{ApiError, ErrorResponse};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::state::AppState;
use lp_core::db::create_user_repository;
use lp_core::models::{Role, User, UserFilter, UserUpdate};

/// A portal user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// `researcher`, `lab_staff` or `admin`.
    pub role: String,
    pub capability_id: Option<Uuid>,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role.as_str().to_string(),
            capability_id: u.capability_id,
            department: u.department,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100), custom(function = "crate::dto::not_blank"))]
    pub name: String,
    /// Defaults to `researcher`.
    pub role: Option<String>,
    pub capability_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "crate::dto::not_blank"))]
    pub name: Option<String>,
    pub role: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub capability_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub department: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    pub capability_id: Option<Uuid>,
    pub is_active: Option<bool>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

fn parse_role(role: &str) -> Result<Role, ApiError> {
    parse_enum("role", role, ROLES)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

/// List users.
#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("role" = Option<String>, Query, description = "Role"),
        ("capability_id" = Option<Uuid>, Query, description = "Home capability"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Search email or name")
    ),
    responses(
        (status = 200, description = "Users", body = Vec<UserResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    tag = "Users"
)]
async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let filter = UserFilter {
        role: query.role.as_deref().map(parse_role).transpose()?,
        capability_id: query.capability_id,
        is_active: query.is_active,
        search: query.search,
    };

    let users = create_user_repository(&state.db).list(&filter).await?;
    Ok(Json(ApiResponse::list(
        users.into_iter().map(Into::into).collect(),
    )))
}

/// Get a user.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users"
)]
async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = create_user_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    Ok(Json(ApiResponse::ok(user.into())))
}

/// Create a user.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input or email already registered", body = ErrorResponse)
    ),
    tag = "Users"
)]
async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let repo = create_user_repository(&state.db);
    let email = request.email.trim().to_lowercase();

    if repo.get_by_email(&email).await?.is_some() {
        return Err(ApiError::validation_field(
            "email",
            "duplicate",
            &format!("Email '{}' is already registered", email),
        ));
    }

    let role = match request.role.as_deref() {
        Some(role) => parse_role(role)?,
        None => Role::default(),
    };

    let mut user = User::new(email, request.name.trim(), role);
    user.capability_id = request.capability_id;
    user.department = request.department;
    user.is_active = request.is_active.unwrap_or(true);

    let created = repo.create(&user).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Update a user.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users"
)]
async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let update = UserUpdate {
        email: request.email.map(|e| e.trim().to_lowercase()),
        name: request.name.map(|n| n.trim().to_string()),
        role: request.role.as_deref().map(parse_role).transpose()?,
        capability_id: request.capability_id,
        department: request.department,
        is_active: request.is_active,
    };

    let updated = create_user_repository(&state.db)
        .update(id, &update)
        .await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}

/// Delete a user. Users with requests cannot be deleted; deactivate them instead.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = DeletedResponse),
        (status = 400, description = "User still referenced", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users"
)]
async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !create_user_repository(&state.db).delete(id).await? {
        return Err(ApiError::not_found("User", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
