//! API error types and the error envelope.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lp_core::db::DbError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// API error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Malformed input or a business rule rejected the request.
    #[error("{0}")]
    BadRequest(String),

    /// The request conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Field-level validation failures.
    #[error("{}", .0.message)]
    ValidationError(ValidationErrorDetails),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Field-level validation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetails {
    pub message: String,
    pub fields: HashMap<String, Vec<FieldError>>,
}

/// A single field validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    /// Validator code, e.g. `length` or `email`.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl ValidationErrorDetails {
    /// A single failing field.
    pub fn field(field: &str, code: &str, message: &str) -> Self {
        let mut fields = HashMap::new();
        fields.insert(
            field.to_string(),
            vec![FieldError {
                code: code.to_string(),
                message: message.to_string(),
                params: None,
            }],
        );
        Self::from_fields(fields)
    }

    pub fn from_fields(fields: HashMap<String, Vec<FieldError>>) -> Self {
        let message = match fields.keys().next() {
            Some(field) if fields.len() == 1 => {
                format!("Validation failed for field '{}'", field)
            }
            _ => format!("Validation failed for {} fields", fields.len()),
        };
        Self { message, fields }
    }
}

/// Error envelope returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    /// Field errors for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Creates a validation error for a single field.
    pub fn validation_field(field: &str, code: &str, message: &str) -> Self {
        ApiError::ValidationError(ValidationErrorDetails::field(field, code, message))
    }

    /// Not-found error naming the entity and the key it was looked up by.
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", entity, key))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let details = match &self {
            ApiError::ValidationError(details) => serde_json::to_value(&details.fields).ok(),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.error_code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::Validation(msg) => ApiError::BadRequest(msg),
            DbError::Constraint(msg) => ApiError::BadRequest(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            err => ApiError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let fields = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let errors = errors
                    .iter()
                    .map(|e| FieldError {
                        code: e.code.to_string(),
                        message: e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Field '{}' is invalid ({})", field, e.code)),
                        params: if e.params.is_empty() {
                            None
                        } else {
                            serde_json::to_value(&e.params).ok()
                        },
                    })
                    .collect();
                (field.to_string(), errors)
            })
            .collect();

        ApiError::ValidationError(ValidationErrorDetails::from_fields(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::validation_field("name", "length", "too short").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_error_mapping() {
        let not_found: ApiError = DbError::NotFound {
            entity: "Capability".into(),
            id: "42".into(),
        }
        .into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Capability with id 42 not found");

        let duplicate: ApiError = DbError::Constraint("UNIQUE constraint failed".into()).into();
        assert_eq!(duplicate.status_code(), StatusCode::BAD_REQUEST);

        let inactive: ApiError = DbError::Validation("Requester is inactive".into()).into();
        assert_eq!(inactive.error_code(), "BAD_REQUEST");

        let overlap: ApiError = DbError::Conflict("Equipment already reserved".into()).into();
        assert_eq!(overlap.status_code(), StatusCode::CONFLICT);

        let broken: ApiError = DbError::Query("no such table".into()).into();
        assert_eq!(broken.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(broken.error_code(), "DATABASE_ERROR");

        // a stored row that no longer decodes is our fault, not the caller's
        let corrupt: ApiError = DbError::Serialization("Invalid UUID: xyz".into()).into();
        assert_eq!(corrupt.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(corrupt.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_validation_message() {
        let single = ValidationErrorDetails::field("email", "email", "Invalid email");
        assert_eq!(single.message, "Validation failed for field 'email'");

        let mut fields = single.fields.clone();
        fields.insert("name".into(), Vec::new());
        let multi = ValidationErrorDetails::from_fields(fields);
        assert_eq!(multi.message, "Validation failed for 2 fields");
    }
}
