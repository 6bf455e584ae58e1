//! Parallel OCR runner: recognise every page concurrently, reassemble in order.
//!
//! ## Execution model
//!
//! Each page becomes one tokio task. At most `config.workers` tasks are in
//! flight at a time (`buffer_unordered`); the next page is dispatched as
//! soon as any running one finishes, with no affinity between pages and
//! workers. Results arrive in completion order and are sorted by page index
//! before concatenation, so the output never depends on scheduling.
//!
//! A page is handed to its task by value, so no two tasks ever touch the
//! same image. Running each page in its own task also contains a panicking
//! recogniser: the panic surfaces as that page's failure instead of tearing
//! down the caller.
//!
//! ## Failure and cancellation
//!
//! The first failed page, in completion order, fails the whole call. The
//! stream is dropped at that point: pages not yet dispatched never start,
//! and the tasks of pages still running are aborted. Dropping the returned
//! future (a timeout, a disconnected HTTP client) aborts them the same way,
//! which drops each page's engine process along with its task.

use crate::config::OcrConfig;
use crate::error::{ExtractError, RecognizeError};
use crate::output::{concatenate, PageText};
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// An OCR engine that turns one page image into text.
///
/// Implementations are shared across concurrently running pages, so they
/// must not keep per-page mutable state. CPU-bound implementations should
/// move their work to `tokio::task::spawn_blocking`.
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    /// Recognise the text on `page` using the Tesseract-style `language` code.
    async fn recognize_page(&self, page: &PageImage, language: &str)
        -> Result<String, RecognizeError>;
}

/// A spawned page task that is aborted when its handle is dropped.
struct PageTask<T>(JoinHandle<T>);

impl<T> Future for PageTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for PageTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Recognise `images` concurrently and join the page texts in page order.
///
/// # Errors
/// [`ExtractError::Recognition`] carrying the first page failure observed.
pub async fn recognize(
    images: Vec<PageImage>,
    recognizer: Arc<dyn PageRecognizer>,
    config: &OcrConfig,
) -> Result<String, ExtractError> {
    let pages = recognize_pages(images, recognizer, config).await?;
    Ok(concatenate(&pages))
}

/// Like [`recognize`], but returns the per-page texts sorted by index.
pub async fn recognize_pages(
    images: Vec<PageImage>,
    recognizer: Arc<dyn PageRecognizer>,
    config: &OcrConfig,
) -> Result<Vec<PageText>, ExtractError> {
    let total_pages = images.len();
    let workers = config.workers.max(1);
    let language: Arc<str> = Arc::from(config.language.as_str());
    info!(
        "Recognising {} pages with {} workers (lang={})",
        total_pages, workers, language
    );

    let tasks = images.into_iter().map(|page| {
        let recognizer = Arc::clone(&recognizer);
        let language = Arc::clone(&language);
        let progress = config.progress_callback.clone();
        async move {
            let index = page.index;
            let page_num = index + 1;
            if let Some(ref cb) = progress {
                cb.on_page_start(page_num, total_pages);
            }

            let outcome = PageTask(tokio::spawn(async move {
                recognizer.recognize_page(&page, &language).await
            }))
            .await
            .unwrap_or_else(|e| {
                Err(RecognizeError::Other(format!("recognition task failed: {e}")))
            });

            match outcome {
                Ok(text) => {
                    debug!("Page {}: recognised {} bytes", page_num, text.len());
                    if let Some(ref cb) = progress {
                        cb.on_page_complete(page_num, total_pages, text.len());
                    }
                    Ok(PageText { index, text })
                }
                Err(e) => {
                    warn!("Page {}: OCR failed: {}", page_num, e);
                    if let Some(ref cb) = progress {
                        cb.on_page_error(page_num, total_pages, &e.to_string());
                    }
                    Err(ExtractError::Recognition {
                        page: page_num,
                        detail: e.to_string(),
                    })
                }
            }
        }
    });

    let mut pages: Vec<PageText> = stream::iter(tasks)
        .buffer_unordered(workers)
        .try_collect()
        .await?;

    pages.sort_by_key(|p| p.index);
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn blank_pages(n: usize) -> Vec<PageImage> {
        (0..n)
            .map(|index| PageImage {
                index,
                image: DynamicImage::ImageLuma8(GrayImage::new(4, 4)),
            })
            .collect()
    }

    /// Returns "p{index}" and records the peak number of concurrent calls.
    struct Tracking {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageRecognizer for Tracking {
        async fn recognize_page(
            &self,
            page: &PageImage,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("p{}", page.index))
        }
    }

    struct Panicking;

    #[async_trait]
    impl PageRecognizer for Panicking {
        async fn recognize_page(
            &self,
            page: &PageImage,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            if page.index == 1 {
                panic!("engine blew up");
            }
            Ok("ok".into())
        }
    }

    /// Sleeps, then records that it ran to completion.
    struct Slow {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl PageRecognizer for Slow {
        async fn recognize_page(
            &self,
            _page: &PageImage,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn worker_count_bounds_concurrency() {
        let rec = Arc::new(Tracking {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = OcrConfig::builder().workers(2).build().unwrap();

        let text = recognize(blank_pages(6), rec.clone(), &config).await.unwrap();

        assert_eq!(text, "p0p1p2p3p4p5");
        assert!(rec.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_recognizer_becomes_recognition_error() {
        let config = OcrConfig::builder().workers(3).build().unwrap();
        let err = recognize(blank_pages(3), Arc::new(Panicking), &config)
            .await
            .unwrap_err();
        match err {
            ExtractError::Recognition { page, .. } => assert_eq!(page, 2),
            other => panic!("expected Recognition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_pages_gives_empty_text() {
        let rec = Arc::new(Tracking {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let text = recognize(Vec::new(), rec, &OcrConfig::default()).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn dropping_the_call_aborts_running_pages() {
        let rec = Arc::new(Slow {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        let config = OcrConfig::builder().workers(2).build().unwrap();

        let call = recognize(blank_pages(2), rec.clone(), &config);
        let res = tokio::time::timeout(Duration::from_millis(50), call).await;
        assert!(res.is_err(), "call should have timed out");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(rec.started.load(Ordering::SeqCst), 2);
        assert_eq!(rec.finished.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_the_call_kills_engine_processes() {
        use crate::pipeline::tesseract::TesseractRecognizer;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = dir.path().join("slow-engine");
        std::fs::write(
            &script,
            format!("#!/bin/sh\ncat >/dev/null\nsleep 1\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = OcrConfig::builder().workers(1).build().unwrap();
        let call = recognize(
            blank_pages(1),
            Arc::new(TesseractRecognizer::new(&script)),
            &config,
        );
        let res = tokio::time::timeout(Duration::from_millis(200), call).await;
        assert!(res.is_err(), "call should have timed out");

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!marker.exists(), "engine process outlived the cancelled call");
    }
}
