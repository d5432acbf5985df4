use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::upload::{self, UploadedFile, ESSAY_SUGGESTIONS};
use crate::AppState;

use super::models::{
    ChatRequest, ChatResponse, EssayUploadResponse, FileInfo, HealthResponse, IndexResponse,
    MathUploadResponse, NotFoundResponse, SolveRequest, SolveResult, TestResponse,
    UploadListResponse, ENDPOINTS,
};

pub const SERVICE_NAME: &str = "ai-student-backend";

pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "AI student backend is running",
        service: SERVICE_NAME,
        status: "online",
        timestamp: Utc::now(),
        endpoints: ENDPOINTS,
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let deepseek_api = if state.config.ai_configured() {
        "configured"
    } else {
        "not configured"
    };

    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        deepseek_api,
    })
}

pub async fn diagnostics() -> Json<TestResponse> {
    Json(TestResponse {
        success: true,
        message: "API test endpoint is working",
        timestamp: Utc::now(),
        sample_requests: json!({
            "math": { "method": "POST", "path": "/api/math/solve", "body": { "problem": "2+2" } },
            "chat": { "method": "POST", "path": "/api/ai/chat", "body": { "message": "Explain photosynthesis" } },
        }),
    })
}

pub async fn list_uploads(State(state): State<Arc<AppState>>) -> Result<Json<UploadListResponse>> {
    let files = state.uploads.list().await?;
    Ok(Json(UploadListResponse {
        success: true,
        count: files.len(),
        files,
    }))
}

pub async fn solve_math(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<SolveResult>> {
    let example = || Some(json!({ "problem": "2+2" }));
    let missing = || AppError::missing_field("problem", example());
    let Json(payload) = payload.map_err(|rejection| rejected_body(rejection, "problem", example()))?;
    let problem = payload
        .problem
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(missing)?;

    let solved = state.dispatcher.solve(&problem).await?;
    Ok(Json(solved))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let missing = || AppError::missing_field("message", None);
    let Json(payload) = payload.map_err(|rejection| rejected_body(rejection, "message", None))?;
    let message = payload
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(missing)?;

    let response = state.dispatcher.chat(&message).await;
    Ok(Json(ChatResponse {
        success: true,
        response,
        timestamp: Utc::now(),
    }))
}

/// A body that parsed as JSON but did not fit the request struct means the
/// field had the wrong type; anything else is treated as a missing field.
fn rejected_body(rejection: JsonRejection, field: &'static str, example: Option<Value>) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(_) => AppError::non_string_field(field, example),
        _ => AppError::missing_field(field, example),
    }
}

pub async fn upload_math(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<MathUploadResponse>> {
    let file = receive_file(&state, multipart).await?;
    let extracted = state.uploads.extract_text(&file).await?;
    let solution = state.uploads.solve_math(&file, &extracted).await;

    Ok(Json(MathUploadResponse {
        success: true,
        file: FileInfo::from(&file),
        extracted_text: upload::preview(&extracted),
        solution,
        timestamp: Utc::now(),
    }))
}

pub async fn upload_essay(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<EssayUploadResponse>> {
    let file = receive_file(&state, multipart).await?;
    let extracted = state.uploads.extract_text(&file).await?;
    let analysis = state.uploads.analyze_essay(&file, &extracted).await;

    Ok(Json(EssayUploadResponse {
        success: true,
        file: FileInfo::from(&file),
        extracted_text: upload::preview(&extracted),
        analysis,
        suggestions: ESSAY_SUGGESTIONS.to_vec(),
        timestamp: Utc::now(),
    }))
}

/// Pulls the single `file` field out of the form and hands it to the
/// intake. Nothing touches disk until the whole form has been read.
async fn receive_file(
    state: &AppState,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<UploadedFile> {
    let mut multipart = multipart.map_err(|_| AppError::missing_field("file", None))?;

    let mut received = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        if field.name() != Some("file") {
            continue;
        }
        if received.is_some() {
            return Err(AppError::UnsupportedInput(
                "Only one file may be uploaded per request".to_string(),
            ));
        }
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(invalid_form)?;
        received = Some((file_name, content_type, bytes));
    }

    let (file_name, content_type, bytes) =
        received.ok_or_else(|| AppError::missing_field("file", None))?;
    state
        .uploads
        .accept(file_name.as_deref(), content_type.as_deref(), &bytes)
        .await
}

fn invalid_form(err: MultipartError) -> AppError {
    AppError::UnsupportedInput(format!("Invalid upload: {}", err.body_text()))
}

pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            success: false,
            error: "Endpoint not found",
            path: uri.path().to_string(),
            available_endpoints: ENDPOINTS,
        }),
    )
        .into_response()
}
