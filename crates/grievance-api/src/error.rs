//! API error types for escalation endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grievance_escalation::EscalationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for client handling.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// Escalation API error type.
#[derive(Debug, Error)]
pub enum ApiEscalationError {
    /// Engine error.
    #[error(transparent)]
    Escalation(#[from] EscalationError),

    /// Missing or wrong admin token.
    #[error("Authentication required")]
    Unauthorized,

    /// Admin endpoints are closed in this deployment.
    #[error("Access denied")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiEscalationError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Self::Escalation(e) => match e {
                EscalationError::Conflict { .. } => {
                    (StatusCode::CONFLICT, "conflict", e.to_string())
                }
                EscalationError::Timeout(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "timeout",
                    "Storage did not respond in time".to_string(),
                ),
                EscalationError::Configuration(_) => {
                    (StatusCode::BAD_REQUEST, "validation_error", e.to_string())
                }
                EscalationError::Database(db_err) => {
                    tracing::error!("EscalationError::Database: {:?}", db_err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "database_error",
                        "Database error".to_string(),
                    )
                }
                EscalationError::Processing(_) => {
                    tracing::error!("Unhandled escalation error: {:?}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
        };

        let body = ErrorResponse {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiEscalationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiEscalationError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiEscalationError::Forbidden, StatusCode::FORBIDDEN),
            (
                ApiEscalationError::NotFound("rule".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                EscalationError::Timeout(Duration::from_secs(10)).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EscalationError::Conflict {
                    complaint_id: uuid::Uuid::nil(),
                    message: "level moved".to_string(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                EscalationError::Configuration("bad override".to_string()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                EscalationError::Processing("boom".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
