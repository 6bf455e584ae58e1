//! OAuth2 access tokens for Google Cloud Storage.
//!
//! Three credential sources are supported, matching what a Cloud Run or
//! local deployment usually has:
//!
//! | Source | When |
//! |--------|------|
//! | service-account key file | `GOOGLE_APPLICATION_CREDENTIALS` → `"type": "service_account"` |
//! | user credentials file | `GOOGLE_APPLICATION_CREDENTIALS` → `"type": "authorized_user"` (gcloud ADC) |
//! | metadata server | no credentials file; running on GCE / Cloud Run |
//!
//! Tokens are cached and refreshed a minute before they expire.

use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const REFRESH_MARGIN_SECS: i64 = 60;

/// Contents of a Google credentials JSON file.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Where access tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// Signed JWT assertion exchanged at `token_uri`.
    ServiceAccount {
        client_email: String,
        private_key: String,
        token_uri: String,
    },
    /// Refresh-token grant.
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_uri: String,
    },
    /// GCE / Cloud Run metadata server.
    MetadataServer { url: String },
    /// A fixed token, e.g. from `gcloud auth print-access-token`.
    Static(String),
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::ServiceAccount { client_email, .. } => f
                .debug_struct("ServiceAccount")
                .field("client_email", client_email)
                .finish_non_exhaustive(),
            TokenSource::AuthorizedUser { client_id, .. } => f
                .debug_struct("AuthorizedUser")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            TokenSource::MetadataServer { url } => {
                f.debug_struct("MetadataServer").field("url", url).finish()
            }
            TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
        }
    }
}

impl TokenSource {
    /// Load the credentials file at `path`, or fall back to the metadata server.
    pub async fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let Some(path) = path else {
            return Ok(TokenSource::MetadataServer {
                url: METADATA_TOKEN_URL.to_string(),
            });
        };
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            StoreError::Credentials(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a credentials JSON document.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let parsed: CredentialsFile = serde_json::from_str(raw)
            .map_err(|e| StoreError::Credentials(format!("unsupported credentials file: {e}")))?;
        Ok(match parsed {
            CredentialsFile::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => TokenSource::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            },
            CredentialsFile::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
            } => TokenSource::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri: DEFAULT_TOKEN_URI.to_string(),
            },
        })
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Hands out access tokens, refreshing them as needed.
pub struct TokenProvider {
    source: TokenSource,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource, http: reqwest::Client) -> Self {
        Self {
            source,
            http,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, fetching a new one if the cached one is stale.
    pub async fn access_token(&self) -> Result<String, StoreError> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(ref c) = *cached {
            if c.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(c.token.clone());
            }
        }

        let response = self.fetch().await?;
        let expires_at = now + Duration::seconds(response.expires_in.unwrap_or(3600));
        debug!("Obtained storage access token, expires at {}", expires_at);
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }

    async fn fetch(&self) -> Result<TokenResponse, StoreError> {
        let request = match &self.source {
            TokenSource::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => {
                let assertion = sign_assertion(client_email, private_key, token_uri, Utc::now())?;
                self.http.post(token_uri).form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", assertion.as_str()),
                ])
            }
            TokenSource::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => self.http.post(token_uri).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ]),
            TokenSource::MetadataServer { url } => {
                self.http.get(url).header("Metadata-Flavor", "Google")
            }
            TokenSource::Static(token) => {
                return Ok(TokenResponse {
                    access_token: token.clone(),
                    expires_in: None,
                })
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Credentials(format!("token request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Credentials(format!(
                "token endpoint returned HTTP {status}: {body}"
            )));
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| StoreError::Credentials(format!("malformed token response: {e}")))
    }
}

/// Build the RS256-signed JWT a service account trades for an access token.
fn sign_assertion(
    client_email: &str,
    private_key: &str,
    token_uri: &str,
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| StoreError::Credentials(format!("invalid service-account key: {e}")))?;
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: client_email,
        scope: STORAGE_SCOPE,
        aud: token_uri,
        iat,
        exp: iat + 3600,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| StoreError::Credentials(format!("signing assertion failed: {e}")))
}
