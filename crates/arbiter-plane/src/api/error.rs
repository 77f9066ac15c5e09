//! API error types and responses

use arbiter_core::{CoreError, ErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn core_status(err: &CoreError) -> (StatusCode, &'static str) {
    match err {
        CoreError::MissingApiKey => (StatusCode::UNAUTHORIZED, "MISSING_API_KEY"),
        CoreError::UnknownApiKey => (StatusCode::UNAUTHORIZED, "INVALID_API_KEY"),
        CoreError::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_PARAMETERS"),
        CoreError::ForbiddenField(_) => (StatusCode::BAD_REQUEST, "FORBIDDEN_FIELD"),
        CoreError::InvalidPattern { .. } => (StatusCode::BAD_REQUEST, "INVALID_PATTERN"),
        CoreError::MalformedToken(_) => (StatusCode::BAD_REQUEST, "MALFORMED_TOKEN"),
        CoreError::InsufficientPermissions => {
            (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSIONS")
        }
        CoreError::NotAStore(_) => (StatusCode::FORBIDDEN, "NOT_A_STORE"),
        CoreError::UnknownTarget(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_TARGET"),
        CoreError::TargetNotRegistered(_) => (StatusCode::BAD_REQUEST, "TARGET_NOT_REGISTERED"),
        CoreError::ContainerTypeUnknown => {
            (StatusCode::INTERNAL_SERVER_ERROR, "CONTAINER_TYPE_UNKNOWN")
        }
        CoreError::SecretAlreadyIssued => (StatusCode::CONFLICT, "SECRET_ALREADY_ISSUED"),
        CoreError::RandomSource(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::Core(err) => {
                let (status, code) = core_status(err);
                let message = match err.kind() {
                    // Do not leak RNG details to clients
                    ErrorKind::FatalInfrastructure => {
                        error!(error = %err, "Infrastructure failure");
                        "Internal error".to_string()
                    }
                    _ => err.to_string(),
                };
                (status, code, message)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: CoreError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(CoreError::MissingApiKey), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(CoreError::MissingField("name".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CoreError::InsufficientPermissions),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(CoreError::SecretAlreadyIssued), StatusCode::CONFLICT);
        assert_eq!(
            status_of(CoreError::TargetNotRegistered("s".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CoreError::RandomSource("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
