//! # pdfocr
//!
//! Extract the text of scanned PDFs with OCR.
//!
//! Every page is rasterised with pdfium, the page images are recognised
//! concurrently by a bounded pool of Tesseract processes, and the per-page
//! texts are joined back in page order. The same pipeline backs a small
//! HTTP service that can also push the result to a Google Cloud Storage
//! bucket.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Render     rasterise every page via pdfium (spawn_blocking)
//!  ├─ 2. Recognise  up to `workers` pages at once, one tesseract per page
//!  └─ 3. Assemble   sort by page index, concatenate with no separator
//! ```
//!
//! A call either yields the text of *every* page or fails with exactly one
//! [`ExtractError`]; there is no partial output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfocr::{extract_text, OcrConfig, TesseractRecognizer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::builder().language("eng").workers(4).build()?;
//!     let recognizer = Arc::new(TesseractRecognizer::from_config(&config));
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let text = extract_text(&bytes, &config, recognizer).await?;
//!     print!("{text}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfocr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Runtime requirements
//!
//! - a pdfium shared library: `PDFIUM_LIB_PATH`, the working directory, or
//!   the system library path
//! - the `tesseract` executable with the requested language data

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, OcrConfigBuilder, ServiceConfig, StorageConfig};
pub use error::{ConfigError, ExtractError, RecognizeError, StoreError};
pub use extract::{extract, extract_text, extract_text_from_file, extract_text_sync};
pub use output::{concatenate, Extraction, ExtractionStats, PageText};
pub use pipeline::recognize::PageRecognizer;
pub use pipeline::render::PageImage;
pub use pipeline::tesseract::TesseractRecognizer;
pub use progress::{NoopProgressCallback, OcrProgressCallback, ProgressCallback};
pub use storage::{output_filename, timestamped_filename, GcsStore, MemoryStore, TextStore};
