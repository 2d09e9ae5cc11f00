//! API error types.
//!
//! ## Error Flow
//! ```text
//! ValidationError ─┐
//! CoreError ───────┼──► ApiError ──► HTTP status + JSON body
//! DbError ─────────┘
//! ```
//!
//! The JSON body is `{"message": ..., "errors": {field: [messages]}}`;
//! the `errors` map is present only for validation failures, matching
//! what the React client's form handling expects.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use brewpos_core::{CoreError, ValidationError};
use brewpos_db::DbError;

/// API-level errors, each carrying its HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 422 with a per-field error map.
    #[error("Validation failed")]
    Validation(Vec<ValidationError>),

    /// 404.
    #[error("{0} not found")]
    NotFound(String),

    /// 401: missing/invalid credentials or token.
    #[error("{0}")]
    Unauthorized(String),

    /// 403: authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// 409: the request conflicts with current state (e.g. stock ran out).
    #[error("{0}")]
    Conflict(String),

    /// 422 with a single message (business rule, not tied to one field).
    #[error("{0}")]
    Unprocessable(String),

    /// 500. The detail is logged, not sent to the client.
    #[error("Internal server error")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shortcut for single-field validation failures.
    pub fn validation(err: ValidationError) -> Self {
        ApiError::Validation(vec![err])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Validation(errors) => {
                let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for err in errors {
                    map.entry(err.field().to_string())
                        .or_default()
                        .push(err.to_string());
                }
                ErrorBody {
                    message: "Validation failed".to_string(),
                    errors: Some(map),
                }
            }
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Internal server error");
                ErrorBody {
                    message: "Internal server error".to_string(),
                    errors: None,
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                errors: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(vec![err])
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(_) => ApiError::NotFound("Product".to_string()),
            CoreError::InsufficientStock { .. } => ApiError::Conflict(err.to_string()),
            CoreError::SelfDeletion => ApiError::Forbidden(err.to_string()),
            CoreError::EmptySale | CoreError::TooManyLines { .. } => {
                ApiError::Unprocessable(err.to_string())
            }
            CoreError::Validation(v) => ApiError::Validation(vec![v]),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::NotFound(entity),
            DbError::UniqueViolation { field } => {
                // "users.email" → a friendly field-level message
                let field = field.rsplit('.').next().unwrap_or(&field).to_string();
                ApiError::Unprocessable(format!("The {field} has already been taken"))
            }
            DbError::ForeignKeyViolation { .. } => {
                ApiError::Conflict("Record is referenced by other data".to_string())
            }
            DbError::Domain(core) => core.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("Product".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CoreError::SelfDeletion).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(CoreError::InsufficientStock {
                name: "Latte".into(),
                available: 2,
                requested: 5,
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DbError::UniqueViolation {
                field: "users.email".into()
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_validation_field_map() {
        let err = ApiError::validation(ValidationError::Required {
            field: "name".into(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
