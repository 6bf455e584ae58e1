//! HTTP error responses.
//!
//! Every failure is rendered as `{"detail": "..."}` with the status code
//! chosen here, so handlers can use `?` throughout.

use crate::error::{ExtractError, StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const BUCKET_NOT_SET: &str = "GCP_BUCKET_NAME environment variable not set";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (wrong content type, missing field).
    #[error("{0}")]
    BadRequest(String),

    /// Request body exceeded the configured upload limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The extraction pipeline failed.
    #[error("Error processing PDF: {0}")]
    Extraction(#[from] ExtractError),

    /// The extraction pipeline failed on the upload route, which reports
    /// every failure under one generic prefix.
    #[error("Error: {0}")]
    BucketExtraction(ExtractError),

    /// Extraction succeeded but the upload did not.
    #[error("Error: {0}")]
    Storage(#[from] StoreError),

    /// Server-side misconfiguration or I/O failure.
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Extraction(ExtractError::InvalidInput)
            | ApiError::BucketExtraction(ExtractError::InvalidInput) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_)
            | ApiError::BucketExtraction(_)
            | ApiError::Storage(_)
            | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}
