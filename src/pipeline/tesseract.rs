//! Tesseract-backed [`PageRecognizer`].
//!
//! Every page runs in its own `tesseract` process fed over stdin, so pages
//! share nothing: a crash or memory spike on one page cannot affect another,
//! and no temp files are needed. Children are spawned with `kill_on_drop`,
//! so an abandoned extraction does not leave orphaned processes behind.

use crate::config::OcrConfig;
use crate::error::RecognizeError;
use crate::pipeline::encode::encode_page;
use crate::pipeline::recognize::PageRecognizer;
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs the `tesseract` command-line engine once per page.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: PathBuf,
    page_segmentation_mode: Option<u8>,
}

impl TesseractRecognizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            page_segmentation_mode: None,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            program: config.tesseract_path.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
        }
    }

    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = Some(psm);
        self
    }

    /// Arguments for reading the image from stdin and writing text to stdout.
    fn args(&self, language: &str) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
        ];
        if let Some(psm) = self.page_segmentation_mode {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args
    }

    /// Check that the engine can be started, returning its version banner.
    pub async fn version(&self) -> Result<String, RecognizeError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let banner = String::from_utf8_lossy(&output.stdout);
        let banner = if banner.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr)
        } else {
            banner
        };
        Ok(banner.lines().next().unwrap_or_default().to_string())
    }

    fn spawn_error(&self, e: std::io::Error) -> RecognizeError {
        RecognizeError::Spawn {
            program: self.program.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl PageRecognizer for TesseractRecognizer {
    async fn recognize_page(
        &self,
        page: &PageImage,
        language: &str,
    ) -> Result<String, RecognizeError> {
        let png = encode_page(&page.image).map_err(|e| RecognizeError::Encode(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(self.args(language))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Write stdin from a separate task so a chatty engine can't deadlock
        // on a full stdout pipe while we are still feeding it.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecognizeError::Other("tesseract stdin unavailable".into()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let write_result = writer
            .await
            .map_err(|e| RecognizeError::Other(format!("stdin writer failed: {e}")))?;

        if !output.status.success() {
            return Err(RecognizeError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // An engine that exits successfully without draining stdin is fine.
        match write_result {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(RecognizeError::Other(format!("writing page image: {e}")));
            }
            _ => {}
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Page {}: tesseract produced {} bytes", page.index + 1, text.len());
        Ok(text)
    }
}
