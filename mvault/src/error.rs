//! Error types for the mvault HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// mvault-common error
    #[error(transparent)]
    Common(#[from] mvault_common::Error),

    /// Backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        use mvault_common::Error as E;

        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Common(err) => match err {
                E::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
                E::UploadTransfer(_) => (StatusCode::BAD_GATEWAY, "UPLOAD_FAILED"),
                E::MetadataInsert(_) => (StatusCode::BAD_GATEWAY, "METADATA_INSERT_FAILED"),
                E::Fetch(_) => (StatusCode::BAD_GATEWAY, "FETCH_FAILED"),
                E::Deletion(_) => (StatusCode::BAD_GATEWAY, "DELETION_FAILED"),
                E::NotSignedIn => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                E::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                E::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                E::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            },
            ApiError::Backend(err) => match err {
                BackendError::Unauthenticated | BackendError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
                }
                BackendError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                BackendError::Rejected(_) => (StatusCode::BAD_REQUEST, "REJECTED"),
                BackendError::Http(_) | BackendError::Status { .. } | BackendError::Decode(_) => {
                    (StatusCode::BAD_GATEWAY, "BACKEND_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Common(err) => err.to_string(),
            ApiError::Backend(err) => err.to_string(),
        };

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
