//! REST API for document conversion.
//!
//! | Method | Path                   | Purpose                         |
//! |--------|------------------------|---------------------------------|
//! | GET    | `/`                    | Welcome banner                  |
//! | GET    | `/health`              | Liveness + version              |
//! | POST   | `/convert`             | Multipart upload → download URL |
//! | GET    | `/download/{file}`     | Stream a converted file         |

mod handlers;
pub mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::convert::ConversionService;

pub use handlers::{convert_document, download, health_check, index};

/// Multipart framing allowance on top of the file size limit.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversionService>,
}

impl AppState {
    /// Create new API state
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            service: Arc::new(ConversionService::new(config)),
        }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .service
        .config()
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/convert", post(convert_document))
        .route("/download/{file_name}", get(download))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on an already-bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on {}", addr);
    }
    axum::serve(listener, build_router(state)).await
}

/// Start the API server
pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}
