use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::upload::UploadedFile;

pub use crate::dispatcher::SolveResult;

#[derive(Debug, Deserialize)]
pub struct SolveRequest {
    pub problem: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

pub const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        method: "GET",
        path: "/",
        description: "Service banner and endpoint directory",
    },
    Endpoint {
        method: "GET",
        path: "/api/health",
        description: "Health check",
    },
    Endpoint {
        method: "GET",
        path: "/api/test",
        description: "Static diagnostic payload",
    },
    Endpoint {
        method: "GET",
        path: "/api/uploads",
        description: "List files waiting in the upload directory",
    },
    Endpoint {
        method: "POST",
        path: "/api/math/solve",
        description: "Solve a math problem. Body: {\"problem\": \"2+2\"}",
    },
    Endpoint {
        method: "POST",
        path: "/api/ai/chat",
        description: "Chat with the AI tutor. Body: {\"message\": \"...\"}",
    },
    Endpoint {
        method: "POST",
        path: "/api/upload/math",
        description: "Upload a math worksheet (multipart field \"file\")",
    },
    Endpoint {
        method: "POST",
        path: "/api/upload/essay",
        description: "Upload an essay for feedback (multipart field \"file\")",
    },
];

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub service: &'static str,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub endpoints: &'static [Endpoint],
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the process started.
    pub uptime: f64,
    pub deepseek_api: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    pub sample_requests: Value,
}

#[derive(Debug, Serialize)]
pub struct UploadListResponse {
    pub success: bool,
    pub count: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: usize,
}

impl From<&UploadedFile> for FileInfo {
    fn from(file: &UploadedFile) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MathUploadResponse {
    pub success: bool,
    pub file: FileInfo,
    pub extracted_text: String,
    pub solution: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EssayUploadResponse {
    pub success: bool,
    pub file: FileInfo,
    pub extracted_text: String,
    pub analysis: String,
    pub suggestions: Vec<&'static str>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub success: bool,
    pub error: &'static str,
    pub path: String,
    pub available_endpoints: &'static [Endpoint],
}
