//! NebulaBridge API error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic; the actual cause is logged
//! server-side.

use auth_core::{AuthError, FailureKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every rejected credential.
pub(crate) const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// API error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
/// - Configuration: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Bad credentials become 401, provider outages 503 and deployment
/// problems 500, so operators can tell an outage from an attack.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err.kind() {
            FailureKind::Unauthorized => {
                tracing::debug!(target: "nb.errors", reason = err.reason_code(), "Token rejected");
                ApiError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
            }
            FailureKind::Unavailable => ApiError::ServiceUnavailable(err.to_string()),
            FailureKind::Misconfigured => ApiError::Configuration(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            ApiError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            ApiError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "nb.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            ApiError::Configuration(reason) => {
                tracing::error!(target: "nb.config", reason = %reason, "Server misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"nebulabridge-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
