//! Backup and restore of the whole database.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

use crate::dto::ApiResponse;
use crate::error::{ApiError, ErrorResponse};
use crate::extract::ApiJson;
use crate::state::AppState;
use lp_core::db::{create_backup_repository, Backup, RestoreSummary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(export_backup))
        .route("/restore", post(restore_backup))
}

/// Export every collection as one JSON document.
#[utoipa::path(
    get,
    path = "/api/backup",
    responses(
        (status = 200, description = "Backup document"),
        (status = 500, description = "Export failed", body = ErrorResponse)
    ),
    tag = "Backup"
)]
async fn export_backup(State(state): State<AppState>) -> Result<Json<ApiResponse<Backup>>, ApiError> {
    let backup = create_backup_repository(&state.db).export().await?;
    Ok(Json(ApiResponse::ok(backup)))
}

/// Replace every collection with the uploaded backup.
///
/// Accepts the bare document or the envelope `GET /api/backup` returns.
#[utoipa::path(
    post,
    path = "/api/backup/restore",
    responses(
        (status = 200, description = "Row counts restored per collection"),
        (status = 400, description = "Malformed or inconsistent backup", body = ErrorResponse)
    ),
    tag = "Backup"
)]
async fn restore_backup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<Json<ApiResponse<RestoreSummary>>, ApiError> {
    let document = match body {
        serde_json::Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };
    let backup: Backup = serde_json::from_value(document)?;

    warn!(
        exported_at = %backup.exported_at,
        "Restoring backup, existing data will be replaced"
    );
    let summary = create_backup_repository(&state.db).restore(&backup).await?;
    Ok(Json(ApiResponse::ok(summary)))
}
