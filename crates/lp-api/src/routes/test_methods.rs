//! Test method catalog endpoints.

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
use lp_core::db::create_test_method_repository;
use lp_core::models::{TestMethod, TestMethodFilter, TestMethodUpdate};

/// A catalog test method offered by one capability.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TestMethodResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub capability_id: Uuid,
    pub equipment_id: Option<Uuid>,
    pub price: f64,
    pub turnaround_days: i64,
    pub sample_requirement: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TestMethod> for TestMethodResponse {
    fn from(m: TestMethod) -> Self {
        Self {
            id: m.id,
            code: m.code,
            name: m.name,
            capability_id: m.capability_id,
            equipment_id: m.equipment_id,
            price: m.price,
            turnaround_days: m.turnaround_days,
            sample_requirement: m.sample_requirement,
            is_active: m.is_active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTestMethodRequest {
    #[validate(length(min = 1, max = 50), custom(function = "crate::dto::not_blank"))]
    pub code: String,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub name: String,
    pub capability_id: Uuid,
    pub equipment_id: Option<Uuid>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0, max = 365))]
    pub turnaround_days: Option<i64>,
    pub sample_requirement: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTestMethodRequest {
    #[validate(length(min = 1, max = 50), custom(function = "crate::dto::not_blank"))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200), custom(function = "crate::dto::not_blank"))]
    pub name: Option<String>,
    pub capability_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub equipment_id: Option<Option<Uuid>>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0, max = 365))]
    pub turnaround_days: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub sample_requirement: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListTestMethodsQuery {
    pub capability_id: Option<Uuid>,
    pub is_active: Option<bool>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_test_methods).post(create_test_method))
        .route(
            "/:id",
            get(get_test_method)
                .put(update_test_method)
                .delete(delete_test_method),
        )
}

/// List test methods.
#[utoipa::path(
    get,
    path = "/api/test-methods",
    params(
        ("capability_id" = Option<Uuid>, Query, description = "Owning capability"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Search code or name")
    ),
    responses((status = 200, description = "Test methods", body = Vec<TestMethodResponse>)),
    tag = "Test Methods"
)]
async fn list_test_methods(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListTestMethodsQuery>,
) -> Result<Json<ApiResponse<Vec<TestMethodResponse>>>, ApiError> {
    let filter = TestMethodFilter {
        capability_id: query.capability_id,
        is_active: query.is_active,
        search: query.search,
    };

    let methods = create_test_method_repository(&state.db)
        .list(&filter)
        .await?;
    Ok(Json(ApiResponse::list(
        methods.into_iter().map(Into::into).collect(),
    )))
}

/// Get a test method.
#[utoipa::path(
    get,
    path = "/api/test-methods/{id}",
    params(("id" = Uuid, Path, description = "Test method ID")),
    responses(
        (status = 200, description = "Test method", body = TestMethodResponse),
        (status = 404, description = "Test method not found", body = ErrorResponse)
    ),
    tag = "Test Methods"
)]
async fn get_test_method(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<TestMethodResponse>>, ApiError> {
    let method = create_test_method_repository(&state.db)
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Test method", id))?;

    Ok(Json(ApiResponse::ok(method.into())))
}

/// Add a test method to the catalog.
#[utoipa::path(
    post,
    path = "/api/test-methods",
    request_body = CreateTestMethodRequest,
    responses(
        (status = 201, description = "Test method created", body = TestMethodResponse),
        (status = 400, description = "Invalid input, unknown capability or duplicate code", body = ErrorResponse)
    ),
    tag = "Test Methods"
)]
async fn create_test_method(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateTestMethodRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TestMethodResponse>>), ApiError> {
    let mut method = TestMethod::new(
        request.code.trim(),
        request.name.trim(),
        request.capability_id,
    );
    method.equipment_id = request.equipment_id;
    method.price = request.price.unwrap_or(0.0);
    method.turnaround_days = request.turnaround_days.unwrap_or(0);
    method.sample_requirement = request.sample_requirement;
    method.is_active = request.is_active.unwrap_or(true);

    let created = create_test_method_repository(&state.db)
        .create(&method)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// Update a test method.
#[utoipa::path(
    put,
    path = "/api/test-methods/{id}",
    params(("id" = Uuid, Path, description = "Test method ID")),
    request_body = UpdateTestMethodRequest,
    responses(
        (status = 200, description = "Test method updated", body = TestMethodResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Test method not found", body = ErrorResponse)
    ),
    tag = "Test Methods"
)]
async fn update_test_method(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateTestMethodRequest>,
) -> Result<Json<ApiResponse<TestMethodResponse>>, ApiError> {
    let update = TestMethodUpdate {
        code: request.code.map(|c| c.trim().to_string()),
        name: request.name.map(|n| n.trim().to_string()),
        capability_id: request.capability_id,
        equipment_id: request.equipment_id,
        price: request.price,
        turnaround_days: request.turnaround_days,
        sample_requirement: request.sample_requirement,
        is_active: request.is_active,
    };

    let updated = create_test_method_repository(&state.db)
        .update(id, &update)
        .await?;
    Ok(Json(ApiResponse::ok(updated.into())))
}

/// Delete a test method.
#[utoipa::path(
    delete,
    path = "/api/test-methods/{id}",
    params(("id" = Uuid, Path, description = "Test method ID")),
    responses(
        (status = 200, description = "Test method deleted", body = DeletedResponse),
        (status = 400, description = "Test method still referenced", body = ErrorResponse),
        (status = 404, description = "Test method not found", body = ErrorResponse)
    ),
    tag = "Test Methods"
)]
async fn delete_test_method(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !create_test_method_repository(&state.db).delete(id).await? {
        return Err(ApiError::not_found("Test method", id));
    }
    Ok(Json(ApiResponse::ok(DeletedResponse::new(id))))
}
