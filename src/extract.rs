//! Extraction entry points: PDF bytes in, ordered OCR text out.
//!
//! Each call walks `Idle → Rasterizing → Recognizing → Completed` or stops
//! in `Failed`. There are no retry transitions and nothing is kept between
//! calls; a failed call must be re-issued with the same bytes.

use crate::config::OcrConfig;
use crate::error::ExtractError;
use crate::output::{concatenate, Extraction, ExtractionStats};
use crate::pipeline::recognize::{recognize_pages, PageRecognizer};
use crate::pipeline::render::rasterize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Extract the text of every page of `pdf_bytes`, joined in page order.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use pdfocr::{extract_text, OcrConfig, TesseractRecognizer};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("scan.pdf")?;
/// let config = OcrConfig::default();
/// let text = extract_text(&bytes, &config, Arc::new(TesseractRecognizer::default())).await?;
/// println!("{text}");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - [`ExtractError::InvalidInput`]: `pdf_bytes` is empty
/// - [`ExtractError::Render`]: not a PDF, corrupt, or unrenderable
/// - [`ExtractError::Recognition`]: OCR failed on at least one page
pub async fn extract_text(
    pdf_bytes: &[u8],
    config: &OcrConfig,
    recognizer: Arc<dyn PageRecognizer>,
) -> Result<String, ExtractError> {
    extract(pdf_bytes, config, recognizer)
        .await
        .map(|extraction| extraction.text)
}

/// Like [`extract_text`], but also returns per-page texts and timings.
pub async fn extract(
    pdf_bytes: &[u8],
    config: &OcrConfig,
    recognizer: Arc<dyn PageRecognizer>,
) -> Result<Extraction, ExtractError> {
    let total_start = Instant::now();
    info!("Starting OCR extraction: {} bytes", pdf_bytes.len());

    let result = run(pdf_bytes, config, recognizer, total_start).await;
    if let Err(ref e) = result {
        error!("OCR extraction failed: {}", e);
    }
    result
}

async fn run(
    pdf_bytes: &[u8],
    config: &OcrConfig,
    recognizer: Arc<dyn PageRecognizer>,
    total_start: Instant,
) -> Result<Extraction, ExtractError> {
    // ── Rasterizing ──────────────────────────────────────────────────────
    let render_start = Instant::now();
    let images = rasterize(pdf_bytes, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let page_count = images.len();
    info!("Rendered {} pages in {}ms", page_count, render_duration_ms);

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(page_count);
    }

    // ── Recognizing ──────────────────────────────────────────────────────
    let ocr_start = Instant::now();
    let pages = recognize_pages(images, recognizer, config).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    debug!("Recognised {} pages in {}ms", pages.len(), ocr_duration_ms);

    // ── Completed ────────────────────────────────────────────────────────
    let text = concatenate(&pages);
    let stats = ExtractionStats {
        page_count,
        render_duration_ms,
        ocr_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction complete: {} pages, {} bytes of text, {}ms total",
        page_count,
        text.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(page_count);
    }

    Ok(Extraction { text, pages, stats })
}

/// Read a PDF from disk and extract its text.
///
/// An unreadable file is reported as [`ExtractError::Render`].
pub async fn extract_text_from_file(
    path: impl AsRef<Path>,
    config: &OcrConfig,
    recognizer: Arc<dyn PageRecognizer>,
) -> Result<String, ExtractError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractError::render(format!("cannot read '{}': {e}", path.display())))?;
    extract_text(&bytes, config, recognizer).await
}

/// Synchronous wrapper around [`extract_text`].
///
/// Creates a temporary tokio runtime internally; do not call from inside
/// an async context.
pub fn extract_text_sync(
    pdf_bytes: &[u8],
    config: &OcrConfig,
    recognizer: Arc<dyn PageRecognizer>,
) -> Result<String, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::render(format!("failed to create tokio runtime: {e}")))?
        .block_on(extract_text(pdf_bytes, config, recognizer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognizeError;
    use crate::pipeline::render::PageImage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRecognizer(AtomicUsize);

    #[async_trait]
    impl PageRecognizer for CountingRecognizer {
        async fn recognize_page(
            &self,
            _page: &PageImage,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn empty_input_fails_before_recognition() {
        let rec = Arc::new(CountingRecognizer(AtomicUsize::new(0)));
        let err = extract_text(b"", &OcrConfig::default(), rec.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidInput));
        assert_eq!(rec.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn corrupt_input_is_render_error() {
        let rec = Arc::new(CountingRecognizer(AtomicUsize::new(0)));
        let err = extract_text(b"hello, not a pdf", &OcrConfig::default(), rec.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Render { .. }), "got: {err:?}");
        assert_eq!(rec.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_file_is_render_error() {
        let rec = Arc::new(CountingRecognizer(AtomicUsize::new(0)));
        let err = extract_text_from_file("/no/such/file.pdf", &OcrConfig::default(), rec)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Render { .. }));
    }

    #[test]
    fn sync_wrapper_propagates_errors() {
        let rec = Arc::new(CountingRecognizer(AtomicUsize::new(0)));
        let err = extract_text_sync(b"", &OcrConfig::default(), rec).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidInput));
    }
}
