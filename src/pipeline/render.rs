//! PDF rasterisation: render every page of an in-memory PDF to a `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. Rendering is also
//! CPU-heavy, so it runs on tokio's blocking pool instead of stalling the
//! worker threads that serve HTTP requests.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would be a 10,000 px
//! image. `max_rendered_pixels` caps the longest edge regardless of physical
//! size, keeping memory bounded per page.

use crate::config::OcrConfig;
use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// pdfium accepts a header anywhere in the first 1 KiB of the file.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index in the source PDF.
    pub index: usize,
    pub image: DynamicImage,
}

/// Rasterise every page of `pdf_bytes`, in page order.
///
/// # Errors
/// - [`ExtractError::InvalidInput`] for an empty buffer, before any rendering.
/// - [`ExtractError::Render`] when the bytes are not a PDF, the document is
///   corrupt or empty, any page fails to render, or pdfium cannot be loaded.
pub async fn rasterize(
    pdf_bytes: &[u8],
    config: &OcrConfig,
) -> Result<Vec<PageImage>, ExtractError> {
    if pdf_bytes.is_empty() {
        error!("No PDF bytes provided for conversion.");
        return Err(ExtractError::InvalidInput);
    }
    check_pdf_header(pdf_bytes)?;

    let bytes = pdf_bytes.to_vec();
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        rasterize_blocking(&bytes, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| ExtractError::render(format!("render task panicked: {e}")))?
}

/// Reject buffers without a `%PDF-` header before touching pdfium.
fn check_pdf_header(bytes: &[u8]) -> Result<(), ExtractError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        return Ok(());
    }
    let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
    Err(ExtractError::render(format!(
        "not a PDF: missing %PDF- header (first bytes: {magic:?})"
    )))
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    bytes: &[u8],
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<PageImage>, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let detail = format!("{e:?}");
            if detail.contains("Password") || detail.contains("password") {
                if password.is_some() {
                    ExtractError::render(format!("wrong password: {detail}"))
                } else {
                    ExtractError::render(format!("document is encrypted: {detail}"))
                }
            } else {
                ExtractError::render(detail)
            }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ExtractError::render("document has no pages"));
    }
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages.get(idx as u16).map_err(|e| {
            ExtractError::render(format!("page {}: {:?}", idx + 1, e))
        })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ExtractError::render(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push(PageImage { index: idx, image });
    }

    Ok(results)
}

#[cfg(target_os = "macos")]
const PDFIUM_LIB_NAME: &str = "libpdfium.dylib";
#[cfg(target_os = "windows")]
const PDFIUM_LIB_NAME: &str = "pdfium.dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PDFIUM_LIB_NAME: &str = "libpdfium.so";

/// Bind to a pdfium library.
///
/// Search order:
/// 1. `PDFIUM_LIB_PATH`: an explicit library file
/// 2. the platform library in the current directory
/// 3. the system library search path
fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(path) => Pdfium::bind_to_library(PathBuf::from(path)),
        None => Pdfium::bind_to_library(PathBuf::from(".").join(PDFIUM_LIB_NAME))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| {
        ExtractError::render(format!(
            "failed to load the pdfium library ({e:?}); set PDFIUM_LIB_PATH to libpdfium"
        ))
    })?;

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_buffer_is_invalid_input() {
        let err = rasterize(b"", &OcrConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidInput), "got: {err:?}");
    }

    #[tokio::test]
    async fn non_pdf_bytes_are_a_render_error() {
        let err = rasterize(b"PK\x03\x04 definitely a zip", &OcrConfig::default())
            .await
            .unwrap_err();
        match err {
            ExtractError::Render { detail } => assert!(detail.contains("%PDF-"), "{detail}"),
            other => panic!("expected Render, got {other:?}"),
        }
    }

    #[test]
    fn header_may_follow_leading_garbage() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.7\n");
        assert!(check_pdf_header(&bytes).is_ok());
    }

    #[test]
    fn header_beyond_window_is_rejected() {
        let mut bytes = vec![0u8; HEADER_SEARCH_WINDOW];
        bytes.extend_from_slice(b"%PDF-1.7\n");
        assert!(check_pdf_header(&bytes).is_err());
    }
}
