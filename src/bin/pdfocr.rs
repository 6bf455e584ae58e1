//! CLI binary for pdfocr.
//!
//! `pdfocr serve` runs the HTTP service; `pdfocr extract` runs the same
//! pipeline on a local file and prints or saves the text.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfocr::server::{self, AppState};
use pdfocr::{
    extract, output_filename, GcsStore, MemoryStore, OcrConfig, OcrProgressCallback,
    PageRecognizer, ProgressCallback, ServiceConfig, TesseractRecognizer, TextStore,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the PDF renders, then a page bar once the count is known.
/// Pages finish out of order; each completion is logged above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Rendering");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl OcrProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Recognising");
        self.bar.set_message("");
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages recognised",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        // A failed run never reaches on_extraction_complete.
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the text of a scanned PDF
  pdfocr extract scan.pdf

  # German + English, 8 OCR workers, save to a file
  pdfocr extract --lang deu+eng --workers 8 scan.pdf -o scan.txt

  # Extract and upload to the configured bucket
  GCP_BUCKET_NAME=my-bucket pdfocr extract scan.pdf --upload scan.txt

  # Run the HTTP service on port 9000
  pdfocr serve --port 9000

ENVIRONMENT VARIABLES:
  HOST, PORT                       Listen address for `serve` (0.0.0.0:8080)
  STATIC_DIR                       Directory with index.html (static)
  MAX_UPLOAD_MB                    Request body limit (100)
  OCR_LANGUAGE                     Tesseract language(s) (eng)
  OCR_WORKERS                      Concurrent OCR processes (CPU count)
  OCR_MAX_PIXELS                   Longest rendered page side (2000)
  TESSERACT_PATH                   tesseract executable (tesseract)
  GCP_BUCKET_NAME                  Bucket for uploads
  GOOGLE_APPLICATION_CREDENTIALS   Credentials JSON; metadata server if unset
  PDFIUM_LIB_PATH                  Path to libpdfium
  RUST_LOG                         Tracing filter override

A `.env` file in the working directory is loaded first.
"#;

/// OCR text extraction for PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfocr",
    version,
    about = "Extract text from scanned PDFs with Tesseract",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFOCR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Extract text from a local PDF.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address; overrides HOST.
    #[arg(long)]
    host: Option<String>,

    /// Listen port; overrides PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// PDF file to process.
    input: PathBuf,

    /// Write text to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tesseract language code(s), e.g. eng or deu+eng; overrides OCR_LANGUAGE.
    #[arg(long)]
    lang: Option<String>,

    /// Concurrent OCR processes; overrides OCR_WORKERS.
    #[arg(short, long)]
    workers: Option<usize>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFOCR_PASSWORD")]
    password: Option<String>,

    /// Upload the text to the configured bucket under this name.
    #[arg(long, value_name = "NAME")]
    upload: Option<String>,

    /// With --upload, keep the text in memory instead of contacting the bucket.
    #[arg(long, requires = "upload")]
    dry_run: bool,

    /// Print the per-page result as JSON instead of plain text.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDFOCR_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers INFO-level feedback during `extract`.
    let show_progress = matches!(
        &cli.command,
        Command::Extract(a) if !a.no_progress && !a.json
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ServiceConfig::from_env().context("Invalid environment configuration")?;

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Extract(args) => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn OcrProgressCallback>)
            } else {
                None
            };
            config.ocr = build_ocr_config(config.ocr, &args, progress)?;
            run_extract(config, args, cli.quiet).await
        }
    }
}

async fn serve(mut config: ServiceConfig, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let tesseract = TesseractRecognizer::from_config(&config.ocr);
    match tesseract.version().await {
        Ok(v) => tracing::info!("Using {}", v),
        Err(e) => tracing::warn!("tesseract not usable, requests will fail: {}", e),
    }

    let store: Option<Arc<dyn TextStore>> = match config.storage.bucket {
        Some(ref bucket) => {
            tracing::info!("Uploads go to bucket {}", bucket);
            let gcs = GcsStore::from_config(&config.storage)
                .await
                .context("Failed to load storage credentials")?;
            Some(Arc::new(gcs))
        }
        None => {
            tracing::warn!("GCP_BUCKET_NAME not set; /extract-text-to-bucket is disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        config,
        recognizer: Arc::new(tesseract),
        store,
    });
    server::serve(state).await.context("Server failed")
}

/// Apply CLI overrides on top of the environment-derived OCR config.
fn build_ocr_config(
    base: OcrConfig,
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .language(args.lang.clone().unwrap_or(base.language))
        .workers(args.workers.unwrap_or(base.workers))
        .max_rendered_pixels(base.max_rendered_pixels)
        .tesseract_path(base.tesseract_path);
    if let Some(psm) = base.page_segmentation_mode {
        builder = builder.page_segmentation_mode(psm);
    }
    if let Some(pwd) = args.password.clone().or(base.password) {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid OCR options")
}

async fn run_extract(config: ServiceConfig, args: ExtractArgs, quiet: bool) -> Result<()> {
    let recognizer: Arc<dyn PageRecognizer> =
        Arc::new(TesseractRecognizer::from_config(&config.ocr));

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let extraction = extract(&bytes, &config.ocr, recognizer)
        .await
        .context("Extraction failed")?;

    if let Some(ref output_path) = args.output {
        write_atomic(output_path, &extraction.text).await?;
        if !quiet {
            eprintln!(
                "{}  {} pages  {}ms  →  {}",
                green("✔"),
                extraction.stats.page_count,
                extraction.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else if args.json {
        let json =
            serde_json::to_string_pretty(&extraction).context("Failed to serialise output")?;
        println!("{json}");
    } else if args.upload.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(extraction.text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if let Some(ref name) = args.upload {
        let store: Arc<dyn TextStore> = if args.dry_run {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(
                GcsStore::from_config(&config.storage)
                    .await
                    .context("Failed to load storage credentials")?,
            )
        };
        let url = store
            .put_text(&extraction.text, &output_filename(name))
            .await
            .context("Upload failed")?;
        println!("{url}");
    }

    Ok(())
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, text)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename to {}", path.display()))?;
    Ok(())
}
