//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn OcrProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to observe the
//! pipeline as it recognises each page. The CLI uses this to drive a
//! terminal progress bar; the HTTP service runs without one.
//!
//! # Example
//!
//! ```rust
//! use pdfocr::{OcrConfig, OcrProgressCallback, ProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl OcrProgressCallback for Counter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter: ProgressCallback = Arc::new(Counter(AtomicUsize::new(0)));
//! let config = OcrConfig::builder()
//!     .progress_callback(counter)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// Pages are recognised concurrently, so `on_page_start`, `on_page_complete`
/// and `on_page_error` may be called from several tasks at once and in any
/// page order. Page numbers are 1-indexed. All methods default to no-ops.
pub trait OcrProgressCallback: Send + Sync {
    /// Called once after rasterisation, before any page is recognised.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is handed to the recogniser.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is recognised.
    ///
    /// `text_len` is the byte length of the recognised text.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails. The extraction is aborted right after.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once when every page has been recognised successfully.
    fn on_extraction_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl OcrProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn OcrProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
    }

    impl OcrProgressCallback for Tracking {
        fn on_extraction_start(&self, total_pages: usize) {
            self.total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, 10);
        cb.on_page_error(2, 2, "tesseract exited with 1");
        cb.on_extraction_complete(2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_extraction_start(3);
        t.on_page_start(2, 3);
        t.on_page_start(1, 3);
        t.on_page_complete(2, 3, 5);
        t.on_page_error(1, 3, "boom");

        assert_eq!(t.total.load(Ordering::SeqCst), 3);
        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
    }
}
