//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use tracing::error;
use waybill_core::WaybillError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from waybill-core errors
impl From<WaybillError> for ApiError {
    fn from(err: WaybillError) -> Self {
        let code = err.code().as_str();

        match err {
            WaybillError::NotFound { message, .. } => ApiError::not_found(message),
            WaybillError::Validation {
                message, details, ..
            } => {
                let api = ApiError::validation(message);
                if details.is_empty() {
                    api
                } else {
                    api.with_details(serde_json::json!(details))
                }
            }
            WaybillError::Conflict { message, .. } => {
                ApiError::conflict(message).with_details(serde_json::json!({ "code": code }))
            }
            WaybillError::Configuration(msg) => ApiError::bad_request(msg),
            other => {
                error!(code, error = %other, "Request failed");
                ApiError::internal(other.to_string())
                    .with_details(serde_json::json!({ "code": code }))
            }
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found: ApiError = WaybillError::not_found("Order", "42").into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let invalid: ApiError = WaybillError::invalid_field("zone_id", "unknown zone").into();
        assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            invalid.details,
            Some(serde_json::json!({ "zone_id": "unknown zone" }))
        );

        let conflict: ApiError = WaybillError::conflict("version 2 taken").into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let in_use: ApiError = WaybillError::integrity("zone is still in use").into();
        assert_eq!(in_use.status, StatusCode::CONFLICT);
        assert_eq!(in_use.details, Some(serde_json::json!({ "code": "CONFLICT_003" })));

        let storage: ApiError = WaybillError::storage("disk full").into();
        assert_eq!(storage.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
