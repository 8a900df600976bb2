use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::io;

/// Failures of the storage directory.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("path escapes the storage directory: {0}")]
    OutsideRoot(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors returned to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400, upload could not be processed.
    #[error("{0}")]
    BadUpload(String),
    /// 500, the storage directory could not be read.
    #[error("Unable to scan directory")]
    ScanFailed,
    /// 404, plain text.
    #[error("File not found")]
    FileNotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadUpload(message) => {
                tracing::debug!(%message, "upload rejected");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::ScanFailed => {
                tracing::error!("unable to scan upload directory");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": ApiError::ScanFailed.to_string() })),
                )
                    .into_response()
            }
            ApiError::FileNotFound => (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "File not found",
            )
                .into_response(),
        }
    }
}
