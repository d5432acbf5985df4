mod handlers;
mod models;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub use handlers::SERVICE_NAME;
pub use models::{
    ChatRequest, ChatResponse, Endpoint, EssayUploadResponse, FileInfo, HealthResponse,
    IndexResponse, MathUploadResponse, NotFoundResponse, SolveRequest, TestResponse,
    UploadListResponse, ENDPOINTS,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        .route("/api/test", get(handlers::diagnostics))
        .route("/api/uploads", get(handlers::list_uploads))
        .route("/api/math/solve", post(handlers::solve_math))
        .route("/api/ai/chat", post(handlers::chat))
        .route("/api/upload/math", post(handlers::upload_math))
        .route("/api/upload/essay", post(handlers::upload_essay))
        .fallback(handlers::not_found)
        .with_state(state)
}
