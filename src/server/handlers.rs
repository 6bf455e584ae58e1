use super::error::{ApiError, BUCKET_NOT_SET};
use super::upload::parse_multipart;
use super::AppState;
use crate::extract::extract_text as run_extraction;
use crate::storage::output_filename;
use axum::extract::{Multipart, Query, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize, Deserialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Deserialize)]
pub struct BucketParams {
    pub filename: Option<String>,
}

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let path = state.config.static_dir.join("index.html");
    tokio::fs::read_to_string(&path)
        .await
        .map(Html)
        .map_err(|e| ApiError::Internal(format!("cannot read '{}': {e}", path.display())))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /extract-text`
pub async fn extract_text(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<TextResponse>, ApiError> {
    let upload = parse_multipart(multipart).await?;
    debug!("Received '{}' ({} bytes)", upload.filename, upload.data.len());

    let text = run_extraction(&upload.data, &state.config.ocr, state.recognizer.clone()).await?;
    Ok(Json(TextResponse { text }))
}

/// `POST /extract-text-to-bucket?filename=...`
pub async fn extract_text_to_bucket(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BucketParams>,
    multipart: Multipart,
) -> Result<Json<UrlResponse>, ApiError> {
    let upload = parse_multipart(multipart).await?;

    let text = run_extraction(&upload.data, &state.config.ocr, state.recognizer.clone())
        .await
        .map_err(ApiError::BucketExtraction)?;
    debug!("Extracted text length: {}", text.len());

    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::Internal(BUCKET_NOT_SET.into()))?;

    let requested = params
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or(upload.filename);
    let destination = output_filename(&requested);
    debug!("Preparing to upload to bucket, filename: {}", destination);

    let url = store.put_text(&text, &destination).await?;
    debug!("Upload complete. File URL: {}", url);
    Ok(Json(UrlResponse { url }))
}
