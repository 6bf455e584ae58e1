//! Configuration types for OCR extraction and the HTTP service.
//!
//! Pipeline behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. Process-level settings (bind address, bucket,
//! credentials) live in [`ServiceConfig`], read once from the environment at
//! start-up and passed explicitly to whoever needs them; nothing in the
//! library reads the environment after that.

use crate::error::ConfigError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for one extraction call.
///
/// # Example
/// ```rust
/// use pdfocr::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .language("eng")
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. `"eng"` or `"eng+deu"`. Default: `"eng"`.
    ///
    /// Fixed per process; requests cannot override it.
    pub language: String,

    /// Maximum number of pages recognised at the same time.
    /// Default: the number of available CPUs.
    pub workers: usize,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps memory for oversized pages while keeping body text large enough
    /// for Tesseract (which prefers ~30 px capital height).
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Path or name of the `tesseract` executable. Default: `"tesseract"`.
    pub tesseract_path: PathBuf,

    /// Tesseract `--psm` value (0–13). `None` keeps Tesseract's default.
    pub page_segmentation_mode: Option<u8>,

    /// Receives per-page events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            workers: default_workers(),
            max_rendered_pixels: 2000,
            password: None,
            tesseract_path: PathBuf::from("tesseract"),
            page_segmentation_mode: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("language", &self.language)
            .field("workers", &self.workers)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tesseract_path", &self.tesseract_path)
            .field("page_segmentation_mode", &self.page_segmentation_mode)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn OcrProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.page_segmentation_mode = Some(psm);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, ConfigError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(ConfigError::Invalid("workers must be ≥ 1".into()));
        }
        if !is_valid_language(&c.language) {
            return Err(ConfigError::Invalid(format!(
                "language must be Tesseract codes joined by '+', got {:?}",
                c.language
            )));
        }
        if let Some(psm) = c.page_segmentation_mode {
            if psm > 13 {
                return Err(ConfigError::Invalid(format!(
                    "page segmentation mode must be 0–13, got {psm}"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Tesseract language specs are `[A-Za-z0-9_]` codes joined by `+`.
fn is_valid_language(lang: &str) -> bool {
    !lang.is_empty()
        && lang.split('+').all(|code| {
            !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Where extracted text is uploaded.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Target bucket. `None` disables uploads.
    pub bucket: Option<String>,
    /// Path to a Google credentials JSON file. `None` uses the metadata server.
    pub credentials_path: Option<PathBuf>,
}

/// Process-wide settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `index.html` and other static assets.
    pub static_dir: PathBuf,
    /// Maximum accepted request body in bytes.
    pub max_upload_bytes: usize,
    pub ocr: OcrConfig,
    pub storage: StorageConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 100 * 1024 * 1024,
            ocr: OcrConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `8080` |
    /// | `STATIC_DIR` | `static` |
    /// | `MAX_UPLOAD_MB` | `100` |
    /// | `OCR_LANGUAGE` | `eng` |
    /// | `OCR_WORKERS` | available CPUs |
    /// | `OCR_MAX_PIXELS` | `2000` |
    /// | `TESSERACT_PATH` | `tesseract` |
    /// | `GCP_BUCKET_NAME` | unset |
    /// | `GOOGLE_APPLICATION_CREDENTIALS` | unset |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServiceConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ServiceConfig::default();

        let mut ocr = OcrConfig::builder();
        if let Some(lang) = get("OCR_LANGUAGE") {
            ocr = ocr.language(lang.trim());
        }
        if let Some(v) = get("OCR_WORKERS") {
            ocr = ocr.workers(parse_env("OCR_WORKERS", &v)?);
        }
        if let Some(v) = get("OCR_MAX_PIXELS") {
            ocr = ocr.max_rendered_pixels(parse_env("OCR_MAX_PIXELS", &v)?);
        }
        if let Some(path) = get("TESSERACT_PATH") {
            ocr = ocr.tesseract_path(path);
        }

        let max_upload_bytes = match get("MAX_UPLOAD_MB") {
            Some(v) => parse_env::<usize>("MAX_UPLOAD_MB", &v)?.saturating_mul(1024 * 1024),
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: match get("PORT") {
                Some(v) => parse_env("PORT", &v)?,
                None => defaults.port,
            },
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            max_upload_bytes,
            ocr: ocr.build()?,
            storage: StorageConfig {
                bucket: get("GCP_BUCKET_NAME"),
                credentials_path: get("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            },
        })
    }
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::BadEnv {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
