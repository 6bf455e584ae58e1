//! Integration tests for the OCR runner and extraction entry points.
//!
//! These never touch pdfium or tesseract: page images are built in memory
//! and recognised by scripted recognisers whose completion order is forced
//! with sleeps.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use pdfocr::pipeline::recognize::{recognize, recognize_pages};
use pdfocr::{
    extract_text, ExtractError, OcrConfig, OcrProgressCallback, PageImage, PageRecognizer,
    RecognizeError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn pages(n: usize) -> Vec<PageImage> {
    (0..n)
        .map(|index| PageImage {
            index,
            image: DynamicImage::ImageLuma8(GrayImage::new(8, 8)),
        })
        .collect()
}

fn config(workers: usize) -> OcrConfig {
    OcrConfig::builder().workers(workers).build().unwrap()
}

/// Returns `texts[index]` after `delays_ms[index]`; fails on `fail_on`.
struct Scripted {
    texts: Vec<&'static str>,
    delays_ms: Vec<u64>,
    fail_on: Option<usize>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(texts: Vec<&'static str>, delays_ms: Vec<u64>) -> Self {
        Self {
            texts,
            delays_ms,
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, index: usize) -> Self {
        self.fail_on = Some(index);
        self
    }
}

#[async_trait]
impl PageRecognizer for Scripted {
    async fn recognize_page(
        &self,
        page: &PageImage,
        _language: &str,
    ) -> Result<String, RecognizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.get(page.index).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if self.fail_on == Some(page.index) {
            return Err(RecognizeError::Engine {
                status: "exit status: 1".into(),
                stderr: "Error in pixReadMem".into(),
            });
        }
        Ok(self.texts[page.index].to_string())
    }
}

#[derive(Default)]
struct Recorder {
    started: Mutex<Vec<usize>>,
    completed: Mutex<Vec<usize>>,
    failed: Mutex<Vec<usize>>,
}

impl OcrProgressCallback for Recorder {
    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.started.lock().unwrap().push(page_num);
    }
    fn on_page_complete(&self, page_num: usize, _total: usize, _text_len: usize) {
        self.completed.lock().unwrap().push(page_num);
    }
    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.failed.lock().unwrap().push(page_num);
    }
}

// ── Ordering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reverse_completion_order_still_yields_page_order() {
    // Page 0 finishes last, page 2 first.
    let rec = Arc::new(Scripted::new(vec!["A", "B", "C"], vec![90, 45, 0]));
    let text = recognize(pages(3), rec, &config(3)).await.unwrap();
    assert_eq!(text, "ABC");
}

#[tokio::test]
async fn pages_are_joined_without_separator() {
    let rec = Arc::new(Scripted::new(vec!["first\n", "second\n"], vec![0, 0]));
    let text = recognize(pages(2), rec, &config(2)).await.unwrap();
    assert_eq!(text, "first\nsecond\n");
}

#[tokio::test]
async fn empty_page_text_is_kept_in_place() {
    let rec = Arc::new(Scripted::new(vec!["A", "", "C"], vec![10, 0, 5]));
    let pages = recognize_pages(pages(3), rec, &config(2)).await.unwrap();
    let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(pages[1].text, "");
}

#[tokio::test]
async fn single_worker_processes_every_page() {
    let texts = vec!["p0 ", "p1 ", "p2 ", "p3 ", "p4 "];
    let rec = Arc::new(Scripted::new(texts, vec![3, 1, 4, 1, 5]));
    let text = recognize(pages(5), rec.clone(), &config(1)).await.unwrap();
    assert_eq!(text, "p0 p1 p2 p3 p4 ");
    assert_eq!(rec.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn more_workers_than_pages() {
    let rec = Arc::new(Scripted::new(vec!["x", "y"], vec![20, 0]));
    let text = recognize(pages(2), rec, &config(16)).await.unwrap();
    assert_eq!(text, "xy");
}

#[tokio::test]
async fn repeated_runs_agree_regardless_of_timing() {
    let texts = vec!["a", "b", "c", "d"];
    let first = recognize(
        pages(4),
        Arc::new(Scripted::new(texts.clone(), vec![40, 30, 20, 10])),
        &config(4),
    )
    .await
    .unwrap();
    let second = recognize(
        pages(4),
        Arc::new(Scripted::new(texts, vec![10, 20, 30, 40])),
        &config(2),
    )
    .await
    .unwrap();
    assert_eq!(first, "abcd");
    assert_eq!(first, second);
}

// ── Failure ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failure_on_second_page_fails_the_whole_call() {
    let rec = Arc::new(Scripted::new(vec!["A", "B", "C"], vec![0, 0, 0]).failing_on(1));
    let err = recognize(pages(3), rec, &config(3)).await.unwrap_err();
    match err {
        ExtractError::Recognition { page, detail } => {
            assert_eq!(page, 2);
            assert!(detail.contains("pixReadMem"), "detail: {detail}");
        }
        other => panic!("expected Recognition, got {other:?}"),
    }
}

#[tokio::test]
async fn failure_stops_dispatch_of_remaining_pages() {
    // One worker, page 0 fails immediately: nothing after it may start.
    let rec = Arc::new(Scripted::new(vec!["A", "B", "C", "D"], vec![0; 4]).failing_on(0));
    let err = recognize(pages(4), rec.clone(), &config(1)).await.unwrap_err();
    assert!(matches!(err, ExtractError::Recognition { page: 1, .. }));
    assert_eq!(rec.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn progress_events_use_one_based_page_numbers() {
    let recorder = Arc::new(Recorder::default());
    let cfg = OcrConfig::builder()
        .workers(2)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let rec = Arc::new(Scripted::new(vec!["A", "B", "C"], vec![0, 20, 0]).failing_on(1));

    let err = recognize(pages(3), rec, &cfg).await.unwrap_err();
    assert!(matches!(err, ExtractError::Recognition { page: 2, .. }));

    let failed = recorder.failed.lock().unwrap().clone();
    assert_eq!(failed, vec![2]);
    let completed: HashSet<usize> = recorder.completed.lock().unwrap().iter().copied().collect();
    assert!(completed.contains(&1));
    assert!(!completed.contains(&2));
    assert!(recorder.started.lock().unwrap().iter().all(|&p| (1..=3).contains(&p)));
}

// ── Entry points ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_bytes_are_invalid_input() {
    let rec = Arc::new(Scripted::new(vec![], vec![]));
    let err = extract_text(&[], &config(2), rec.clone()).await.unwrap_err();
    assert!(matches!(err, ExtractError::InvalidInput));
    assert!(!err.is_retryable());
    assert_eq!(rec.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_pdf_bytes_are_a_render_error() {
    let rec = Arc::new(Scripted::new(vec![], vec![]));
    let err = extract_text(b"GIF89a\x01\x00\x01\x00", &config(2), rec.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Render { .. }), "got {err:?}");
    assert_eq!(rec.calls.load(Ordering::SeqCst), 0);
}
