//! HTTP backend for students: local arithmetic, an AI tutor behind a
//! chat-completion API, and file uploads that feed the same tutor.

pub mod api;
pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod upload;

use std::{sync::Arc, time::Instant};

use axum::{extract::DefaultBodyLimit, http::Method, Router};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::completion::CompletionClient;
use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::upload::{UploadIntake, MAX_UPLOAD_BYTES};

/// Headroom over the upload limit for multipart framing, so an oversized
/// file is still read and rejected with 400 rather than cut off by the
/// body limit.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Dispatcher,
    pub uploads: UploadIntake,
    pub started_at: Instant,
}

impl AppState {
    /// Must be called from inside a Tokio runtime.
    pub fn new(config: AppConfig) -> Self {
        let client = CompletionClient::new(&config);
        Self {
            dispatcher: Dispatcher::new(client.clone()),
            uploads: UploadIntake::new(&config, client),
            started_at: Instant::now(),
            config,
        }
    }
}

pub fn build_app(state: Arc<AppState>) -> Router {
    api::router(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Every origin is allowed. Origins and headers are mirrored because
/// credentials cannot be combined with a literal `*`.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub async fn run_server(app: Router, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
