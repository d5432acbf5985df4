use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::HeaderMap, routing::post, Json, Router};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use student_backend::{
    build_app,
    completion::APOLOGY,
    config::AppConfig,
    dispatcher::CHAT_UNAVAILABLE,
    AppState,
};
use tower::ServiceExt;

const BOUNDARY: &str = "student-backend-test-boundary";

async fn mock_completion(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer sk-test");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
    }

    let last = body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
        .unwrap_or_default()
        .to_string();

    (
        StatusCode::OK,
        Json(json!({
            "id": "cmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": format!("AI: {last}") }, "finish_reason": "stop" }
            ]
        })),
    )
}

async fn failing_completion() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn empty_completion() -> Json<Value> {
    Json(json!({
        "choices": [ { "index": 0, "message": { "role": "assistant", "content": "" } } ]
    }))
}

async fn slow_completion() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    empty_completion().await
}

async fn spawn_mock_completion_server() -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(mock_completion))
        .route("/fail/chat/completions", post(failing_completion))
        .route("/empty/chat/completions", post(empty_completion))
        .route("/slow/chat/completions", post(slow_completion));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn build_test_app(api_url: Option<String>, upload_dir: &Path) -> Router {
    build_test_app_with_timeout(api_url, upload_dir, 5_000)
}

fn build_test_app_with_timeout(api_url: Option<String>, upload_dir: &Path, timeout_ms: u64) -> Router {
    let config = AppConfig {
        api_key: api_url.as_ref().map(|_| "sk-test".to_string()),
        api_url: api_url.unwrap_or_else(|| "http://127.0.0.1:1/v1/chat/completions".to_string()),
        timeout_ms,
        upload_dir: upload_dir.to_path_buf(),
        cleanup_delay_ms: 60_000,
        ..AppConfig::default()
    };
    build_app(Arc::new(AppState::new(config)))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_file(uri: &str, file_name: &str, content_type: &str, contents: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn stored_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn e2e_root_lists_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(build_test_app(None, dir.path()), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert!(body["endpoints"].as_array().unwrap().len() >= 8);
}

#[tokio::test]
async fn e2e_health_is_structurally_stable() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());

    let (status, first) = send(app.clone(), get("/api/health")).await;
    let (_, second) = send(app, get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "healthy");
    assert_eq!(first["service"], "ai-student-backend");
    assert_eq!(first["deepseek_api"], "not configured");

    let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
    assert_eq!(keys(&first), keys(&second));
    for key in ["status", "service", "deepseek_api"] {
        assert_eq!(first[key], second[key]);
    }
}

#[tokio::test]
async fn e2e_health_reports_configured_key() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some("http://127.0.0.1:1".to_string()), dir.path());
    let (_, body) = send(app, get("/api/health")).await;
    assert_eq!(body["deepseek_api"], "configured");
}

#[tokio::test]
async fn e2e_test_endpoint_returns_static_payload() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(build_test_app(None, dir.path()), get("/api/test")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["sample_requests"]["math"]["body"]["problem"], "2+2");
}

#[tokio::test]
async fn e2e_math_solves_arithmetic_locally() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(app, post_json("/api/math/solve", r#"{"problem":"2^3 + (10+5)/3"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["type"], "basic_calculation");
    assert_eq!(body["result"], "13");
    assert_eq!(body["steps"].as_array().unwrap().len(), 3);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn e2e_math_missing_problem_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());

    let (status, body) = send(app.clone(), post_json("/api/math/solve", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["field"], "problem");
    assert_eq!(body["example"]["problem"], "2+2");

    let (status, body) = send(app, post_json("/api/math/solve", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "problem");
}

#[tokio::test]
async fn e2e_non_string_fields_are_400_with_type_message() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());

    let (status, body) = send(app.clone(), post_json("/api/math/solve", r#"{"problem":5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "problem");
    assert_eq!(body["error"], "problem must be a string");
    assert_eq!(body["example"]["problem"], "2+2");

    let (status, body) = send(app.clone(), post_json("/api/ai/chat", r#"{"message":["hi"]}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "message must be a string");

    let (status, body) = send(app, post_json("/api/ai/chat", "{")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No message provided");
}

#[tokio::test]
async fn e2e_math_word_problem_without_key_is_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(app, post_json("/api/math/solve", r#"{"problem":"solve for y: 2y = 4"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["type"], "text_analysis");
    assert!(!body["result"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn e2e_math_word_problem_falls_back_to_ai() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/v1/chat/completions")), dir.path());
    let (status, body) = send(app, post_json("/api/math/solve", r#"{"problem":"x+2=5"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "ai_solution");
    assert_eq!(
        body["result"],
        "AI: Solve this math problem: x+2=5. Show step-by-step solution."
    );
}

#[tokio::test]
async fn e2e_math_upstream_failure_is_500() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/fail/chat/completions")), dir.path());
    let (status, body) = send(app, post_json("/api/math/solve", r#"{"problem":"integrate x"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to solve problem");
    assert!(body["message"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn e2e_chat_without_key_returns_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(app, post_json("/api/ai/chat", r#"{"message":"hi"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], CHAT_UNAVAILABLE);
}

#[tokio::test]
async fn e2e_chat_missing_message_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(app, post_json("/api/ai/chat", r#"{"message":"   "}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "message");
}

#[tokio::test]
async fn e2e_chat_relays_completion() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/v1/chat/completions")), dir.path());
    let (status, body) = send(app, post_json("/api/ai/chat", r#"{"message":"What is a noun?"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "AI: What is a noun?");
}

#[tokio::test]
async fn e2e_chat_upstream_failure_is_apology() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/fail/chat/completions")), dir.path());
    let (status, body) = send(app, post_json("/api/ai/chat", r#"{"message":"hello"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], APOLOGY);
}

#[tokio::test]
async fn e2e_upload_math_text_file_is_extracted_verbatim() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/v1/chat/completions")), dir.path());
    let (status, body) = send(
        app.clone(),
        post_file("/api/upload/math", "hw.txt", "text/plain", b"3*3"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["extracted_text"], "3*3");
    assert_eq!(body["file"]["name"], "hw.txt");
    assert_eq!(body["file"]["type"], "text/plain");
    assert_eq!(body["file"]["size"], 3);
    assert!(body["solution"].as_str().unwrap().ends_with("3*3"));

    let (_, listing) = send(app, get("/api/uploads")).await;
    assert_eq!(listing["count"], 1);
    assert!(listing["files"][0].as_str().unwrap().ends_with("-hw.txt"));
}

#[tokio::test]
async fn e2e_upload_math_truncates_preview_only() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/v1/chat/completions")), dir.path());
    let text = "7".repeat(800);
    let (status, body) = send(app, post_file("/api/upload/math", "long.txt", "text/plain", text.as_bytes())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extracted_text"].as_str().unwrap().len(), 500);
    assert!(body["solution"].as_str().unwrap().ends_with(&text));
}

#[tokio::test]
async fn e2e_upload_essay_image_gets_placeholder_and_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(
        app,
        post_file("/api/upload/essay", "page.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["extracted_text"]
        .as_str()
        .unwrap()
        .starts_with("[Image file: page.jpg"));
    assert!(!body["analysis"].as_str().unwrap().is_empty());
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn e2e_upload_rejects_unlisted_type_without_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(
        app,
        post_file("/api/upload/math", "anim.gif", "image/gif", b"GIF89a"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(stored_files(dir.path()), 0);
}

#[tokio::test]
async fn e2e_upload_rejects_oversized_file_without_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let big = vec![b'1'; 10 * 1024 * 1024 + 1];
    let (status, body) = send(app, post_file("/api/upload/math", "big.txt", "text/plain", &big)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(stored_files(dir.path()), 0);
}

#[tokio::test]
async fn e2e_upload_without_file_field_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let (status, body) = send(app, post_json("/api/upload/math", "{}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "file");
}

#[tokio::test]
async fn e2e_unknown_route_returns_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(build_test_app(None, dir.path()), get("/api/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["path"], "/api/nope");
    assert!(!body["available_endpoints"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn e2e_cors_allows_any_origin_with_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(None, dir.path());
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/health")
        .header("origin", "https://homework.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "https://homework.example"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn e2e_math_timeout_is_500() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app_with_timeout(Some(format!("{base}/slow/chat/completions")), dir.path(), 200);
    let (status, body) = send(app, post_json("/api/math/solve", r#"{"problem":"factor x^2-1"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to solve problem");
    assert!(body["message"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn e2e_chat_timeout_is_apology() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app_with_timeout(Some(format!("{base}/slow/chat/completions")), dir.path(), 200);
    let (status, body) = send(app, post_json("/api/ai/chat", r#"{"message":"hello?"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], APOLOGY);
}

#[tokio::test]
async fn e2e_blank_completions_never_produce_empty_envelopes() {
    let base = spawn_mock_completion_server().await;
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(Some(format!("{base}/empty/chat/completions")), dir.path());

    let (status, body) = send(
        app.clone(),
        post_file("/api/upload/math", "hw.txt", "text/plain", b"3*3"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["solution"], APOLOGY);

    let (status, body) = send(
        app.clone(),
        post_file("/api/upload/essay", "essay.txt", "text/plain", b"Once upon a time."),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"], APOLOGY);

    let (_, body) = send(app.clone(), post_json("/api/ai/chat", r#"{"message":"hi"}"#)).await;
    assert_eq!(body["response"], APOLOGY);

    let (_, body) = send(app, post_json("/api/math/solve", r#"{"problem":"x+1=2"}"#)).await;
    assert_eq!(body["type"], "ai_solution");
    assert_eq!(body["result"], "AI solution pending");
}
