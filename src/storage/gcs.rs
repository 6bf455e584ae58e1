//! Google Cloud Storage implementation of [`TextStore`].
//!
//! Uploads go through the JSON API's simple (`uploadType=media`) upload,
//! which is a single request and suits text of a few megabytes at most.
//! Object names get a timestamp suffix so repeated uploads of the same
//! document never overwrite each other.

use super::auth::{TokenProvider, TokenSource};
use super::{timestamped_filename, TextStore};
use crate::config::StorageConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, error};

const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const PUBLIC_BASE: &str = "https://storage.googleapis.com";

/// Uploads text objects to a GCS bucket.
pub struct GcsStore {
    bucket: Option<String>,
    tokens: Arc<TokenProvider>,
    http: reqwest::Client,
    upload_base: String,
    public_base: String,
}

impl GcsStore {
    pub fn new(bucket: Option<String>, source: TokenSource) -> Self {
        let http = reqwest::Client::new();
        Self {
            bucket: bucket.filter(|b| !b.is_empty()),
            tokens: Arc::new(TokenProvider::new(source, http.clone())),
            http,
            upload_base: UPLOAD_BASE.to_string(),
            public_base: PUBLIC_BASE.to_string(),
        }
    }

    /// Build a store from configuration, loading credentials if a path is set.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        let source = TokenSource::load(config.credentials_path.as_deref()).await?;
        debug!("GCS credentials: {:?}", source);
        Ok(Self::new(config.bucket.clone(), source))
    }

    /// Point the store at a different API host (emulators, tests).
    pub fn with_endpoints(
        mut self,
        upload_base: impl Into<String>,
        public_base: impl Into<String>,
    ) -> Self {
        self.upload_base = upload_base.into().trim_end_matches('/').to_string();
        self.public_base = public_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Public URL of `object` in `bucket`; `/` in object names is kept.
    pub fn public_url(&self, bucket: &str, object: &str) -> String {
        let encoded: Vec<String> = object
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/{}", self.public_base, bucket, encoded.join("/"))
    }

    async fn upload(&self, bucket: &str, object: &str, text: &str) -> Result<(), StoreError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/b/{}/o", self.upload_base, urlencoding::encode(bucket));

        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                object: object.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Upload {
                object: object.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TextStore for GcsStore {
    async fn put_text(&self, text: &str, destination: &str) -> Result<String, StoreError> {
        if text.is_empty() || destination.is_empty() {
            error!("Text, bucket name, and destination blob name must be provided.");
            return Err(StoreError::MissingInput);
        }
        let bucket = self
            .bucket
            .as_deref()
            .ok_or_else(|| StoreError::Config("GCP_BUCKET_NAME environment variable not set".into()))?;

        let object = timestamped_filename(destination, Local::now().naive_local());
        debug!("Uploading {} bytes to gs://{}/{}", text.len(), bucket, object);
        self.upload(bucket, &object, text).await?;
        debug!("Upload to GCP bucket complete: {}/{}", bucket, object);

        Ok(self.public_url(bucket, &object))
    }
}
