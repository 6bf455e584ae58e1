//! Error types for the pdfocr library.
//!
//! Each layer has its own error type so callers can tell the failure modes
//! apart without string matching:
//!
//! * [`ExtractError`]: **Terminal** failure of one extraction call. Exactly
//!   three variants: nothing to process, the document could not be
//!   rendered, or a page could not be recognised. Returned by
//!   [`crate::extract::extract_text`] and friends.
//!
//! * [`RecognizeError`]: a single page's OCR failed. Produced by a
//!   [`crate::pipeline::recognize::PageRecognizer`] and folded into
//!   [`ExtractError::Recognition`] by the OCR runner.
//!
//! * [`StoreError`]: the persistence collaborator rejected or failed an upload.
//!
//! * [`ConfigError`]: a configuration value was missing or malformed.

use thiserror::Error;

/// Terminal failure of an extraction call.
///
/// There is no partial result: a failed call must be re-issued in full.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The caller supplied zero bytes. Not retryable without new input.
    #[error("No PDF bytes provided")]
    InvalidInput,

    /// The PDF could not be opened or rasterised (bad signature, corrupt
    /// structure, unavailable rendering backend). Not retryable.
    #[error("PDF rendering failed: {detail}")]
    Render { detail: String },

    /// OCR failed on a page; carries the first failure observed.
    /// Retryable by resubmitting the same document.
    #[error("OCR failed on page {page}: {detail}")]
    Recognition { page: usize, detail: String },
}

impl ExtractError {
    /// Whether resubmitting the same input can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Recognition { .. })
    }

    pub(crate) fn render(detail: impl Into<String>) -> Self {
        ExtractError::Render {
            detail: detail.into(),
        }
    }
}

/// Failure of a single page recognition.
#[derive(Debug, Clone, Error)]
pub enum RecognizeError {
    /// The page image could not be prepared for the OCR engine.
    #[error("image encoding failed: {0}")]
    Encode(String),

    /// The OCR engine could not be started.
    #[error("failed to run '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The OCR engine ran and reported failure.
    #[error("OCR engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },

    /// Anything else an implementation wants to report.
    #[error("{0}")]
    Other(String),
}

/// Failure of the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Text or destination name was empty.
    #[error("Text, bucket name, and destination blob name must be provided.")]
    MissingInput,

    /// A required identifier (bucket name) is not configured.
    #[error("Storage is not configured: {0}")]
    Config(String),

    /// Credentials could not be loaded or exchanged for an access token.
    #[error("Failed to obtain storage credentials: {0}")]
    Credentials(String),

    /// The upload request failed.
    #[error("Upload of '{object}' failed: {reason}")]
    Upload { object: String, reason: String },
}

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// An environment variable held a value that could not be parsed.
    #[error("Environment variable {var}={value:?} is invalid: {reason}")]
    BadEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}
