//! HTTP front end for the extraction pipeline.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | `index.html` from the static directory |
//! | `GET /static/*` | static assets |
//! | `GET /health` | liveness probe |
//! | `POST /extract-text` | multipart `file` → `{"text": ...}` |
//! | `POST /extract-text-to-bucket` | multipart `file` → upload → `{"url": ...}` |

pub mod error;
pub mod handlers;
pub mod upload;

use crate::config::ServiceConfig;
use crate::pipeline::recognize::PageRecognizer;
use crate::storage::TextStore;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
pub struct AppState {
    pub config: ServiceConfig,
    pub recognizer: Arc<dyn PageRecognizer>,
    /// `None` when no bucket is configured; bucket uploads then fail with 500.
    pub store: Option<Arc<dyn TextStore>>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/extract-text", post(handlers::extract_text))
        .route(
            "/extract-text-to-bucket",
            post(handlers::extract_text_to_bucket),
        )
        .nest_service("/static", static_files)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `host:port` and serve until Ctrl-C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("pdfocr listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
