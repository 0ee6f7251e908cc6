//! Error types for eanscout-api
//!
//! Domain errors from `eanscout_common` map onto HTTP statuses here; every
//! error body is `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eanscout_common::Error as CommonError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Domain error, status chosen by variant
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Common(err) => match err {
                CommonError::InvalidEan(_) => (StatusCode::BAD_REQUEST, "INVALID_EAN"),
                CommonError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                CommonError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
                CommonError::ImageNotFound(_) => (StatusCode::NOT_FOUND, "IMAGE_NOT_FOUND"),
                CommonError::TaskNotFound(_) => (StatusCode::NOT_FOUND, "TASK_NOT_FOUND"),
                CommonError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
                CommonError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                CommonError::Acquisition(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "ACQUISITION_ERROR")
                }
                CommonError::UnsupportedSiteKind(_) | CommonError::Config(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR")
                }
                CommonError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Common(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (CommonError::InvalidEan("12".into()), StatusCode::BAD_REQUEST),
            (CommonError::InvalidInput("ext".into()), StatusCode::BAD_REQUEST),
            (CommonError::ProductNotFound("x".into()), StatusCode::NOT_FOUND),
            (CommonError::ImageNotFound("1".into()), StatusCode::NOT_FOUND),
            (CommonError::TaskNotFound("t".into()), StatusCode::NOT_FOUND),
            (
                CommonError::UnsupportedSiteKind("amazon".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CommonError::Acquisition("timeout".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
