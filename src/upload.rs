//! File intake for the upload endpoints.
//!
//! Files are validated in memory, written to the upload directory, read back
//! once to build the prompt text, and removed by the cleanup task after a
//! fixed delay whether or not the request succeeded.

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::time::DelayQueue;

use crate::completion::{CompletionClient, Conversation};
use crate::config::AppConfig;
use crate::dispatcher::MATH_TUTOR_PROMPT;
use crate::error::{AppError, Result};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const PREVIEW_CHARS: usize = 500;

pub const ESSAY_TUTOR_PROMPT: &str =
    "You are a writing tutor. Give students constructive, specific feedback on their essays.";

pub const ESSAY_SUGGESTIONS: [&str; 5] = [
    "Check that your thesis statement is clear and specific",
    "Make sure each paragraph supports your main argument",
    "Use transitions to connect your ideas between paragraphs",
    "Proofread for grammar, spelling, and punctuation errors",
    "Cite sources for any facts, data, or quotations you use",
];

const UPLOAD_UNAVAILABLE: &str = "File received, but AI analysis is not configured on the server. Set DEEPSEEK_API_KEY to enable AI feedback on uploads.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Jpeg,
    Png,
    Pdf,
    Text,
    Docx,
}

impl FileKind {
    /// Maps a `Content-Type` value onto the allow-list. Parameters such as
    /// `charset` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::Text),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Jpeg | Self::Png => "Image file",
            Self::Pdf => "PDF document",
            Self::Text => "Text file",
            Self::Docx => "Word document",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub storage_path: PathBuf,
    pub kind: FileKind,
}

#[derive(Clone)]
pub struct UploadIntake {
    dir: PathBuf,
    client: CompletionClient,
    cleanup: CleanupScheduler,
}

impl UploadIntake {
    /// Must be called from inside a Tokio runtime; spawns the cleanup task.
    pub fn new(config: &AppConfig, client: CompletionClient) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            client,
            cleanup: CleanupScheduler::spawn(config.cleanup_delay()),
        }
    }

    /// Validates and stores one upload, then schedules its deletion.
    pub async fn accept(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<UploadedFile> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::UnsupportedInput(format!(
                "File too large: {} bytes. Maximum size is 10 MB",
                bytes.len()
            )));
        }

        let mime_type = content_type.unwrap_or("application/octet-stream").to_string();
        let kind = FileKind::from_mime(&mime_type).ok_or_else(|| {
            AppError::UnsupportedInput(format!(
                "Unsupported file type: {mime_type}. Allowed types: JPEG, PNG, PDF, TXT, DOCX"
            ))
        })?;

        let name = sanitize_file_name(file_name.unwrap_or_default());
        let storage_path = self
            .dir
            .join(format!("{}-{name}", Utc::now().timestamp_millis()));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::internal("Failed to store upload", e))?;
        tokio::fs::write(&storage_path, bytes)
            .await
            .map_err(|e| AppError::internal("Failed to store upload", e))?;
        self.cleanup.schedule(storage_path.clone());

        tracing::info!(
            file = %name,
            mime = %mime_type,
            size = bytes.len(),
            path = %storage_path.display(),
            "upload stored"
        );

        Ok(UploadedFile {
            name,
            mime_type,
            size_bytes: bytes.len(),
            storage_path,
            kind,
        })
    }

    /// Full text for the prompt. Only plain-text files are actually read;
    /// every other kind gets a labelled placeholder.
    pub async fn extract_text(&self, file: &UploadedFile) -> Result<String> {
        match file.kind {
            FileKind::Text => {
                let raw = tokio::fs::read(&file.storage_path)
                    .await
                    .map_err(|e| AppError::internal("Failed to read upload", e))?;
                Ok(String::from_utf8_lossy(&raw).into_owned())
            }
            FileKind::Jpeg | FileKind::Png => Ok(format!(
                "[{}: {} ({})] Text extraction from images is not available: OCR is not performed on this server.",
                file.kind.label(),
                file.name,
                file.mime_type
            )),
            FileKind::Pdf | FileKind::Docx => Ok(format!(
                "[{}: {}] Text extraction from this document type is not available: the file was not parsed.",
                file.kind.label(),
                file.name
            )),
        }
    }

    pub async fn solve_math(&self, file: &UploadedFile, extracted: &str) -> String {
        if !self.client.is_configured() {
            return UPLOAD_UNAVAILABLE.to_string();
        }
        let conversation = Conversation::with_system(
            MATH_TUTOR_PROMPT,
            format!(
                "Solve the math problems found in the uploaded file \"{}\". Show step-by-step solutions.\n\n{extracted}",
                file.name
            ),
        );
        self.client.complete_or_apology(&conversation).await
    }

    pub async fn analyze_essay(&self, file: &UploadedFile, extracted: &str) -> String {
        if !self.client.is_configured() {
            return UPLOAD_UNAVAILABLE.to_string();
        }
        let conversation = Conversation::with_system(
            ESSAY_TUTOR_PROMPT,
            format!(
                "Analyze the essay in the uploaded file \"{}\". Comment on structure, clarity, grammar, and the strength of its arguments.\n\n{extracted}",
                file.name
            ),
        );
        self.client.complete_or_apology(&conversation).await
    }

    /// Names of files currently waiting in the upload directory.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::internal("Failed to list uploads", e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::internal("Failed to list uploads", e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Deletes files after a fixed delay on a background task.
#[derive(Clone)]
pub struct CleanupScheduler {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl CleanupScheduler {
    pub fn spawn(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_cleanup(rx, delay));
        Self { tx }
    }

    pub fn schedule(&self, path: PathBuf) {
        if let Err(err) = self.tx.send(path) {
            tracing::warn!(path = %err.0.display(), "cleanup task stopped, upload will not be removed");
        }
    }
}

async fn run_cleanup(mut rx: mpsc::UnboundedReceiver<PathBuf>, delay: Duration) {
    let mut queue = DelayQueue::new();

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(path) => {
                    queue.insert(path, delay);
                }
                None => break,
            },
            Some(expired) = queue.next(), if !queue.is_empty() => {
                remove_upload(expired.into_inner()).await;
            }
        }
    }

    while let Some(expired) = queue.next().await {
        remove_upload(expired.into_inner()).await;
    }
}

async fn remove_upload(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "upload removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove upload"),
    }
}
