//! Pipeline stages for PDF OCR extraction.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the OCR engine can be swapped without touching
//! rendering.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ render ──▶ recognize (fan-out) ──▶ reassemble by index ──▶ text
//!           (pdfium)   (encode + tesseract per page)
//! ```
//!
//! 1. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`recognize`]: bounded concurrent OCR with ordered fan-in
//! 3. [`encode`]: grayscale PNG encoding of a page for the engine
//! 4. [`tesseract`]: the production recogniser, one process per page

pub mod encode;
pub mod recognize;
pub mod render;
pub mod tesseract;
