use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{timeout, Duration};

use crate::config::AppConfig;

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 1000;

pub const APOLOGY: &str =
    "I'm sorry, I couldn't process that request. Please check your API key or try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Ordered turns sent to the model in one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation(Vec<ChatMessage>);

impl Conversation {
    /// A system instruction followed by a single user turn.
    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion API key is not configured")]
    MissingCredential,
    #[error("invalid completion API key header value: {0}")]
    InvalidCredential(#[from] reqwest::header::InvalidHeaderValue),
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to send completion request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion API returned a malformed body: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("completion API returned no choices")]
    EmptyChoices,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends `conversation` and returns the first choice's text.
    pub async fn complete(&self, conversation: &Conversation) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let payload = CompletionRequest {
            model: &self.model,
            messages: conversation.messages(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let fut = async move {
            let response = self
                .http
                .post(&self.api_url)
                .headers(headers)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            Ok::<_, CompletionError>((status, body))
        };

        let (status, body) = timeout(self.timeout, fut)
            .await
            .map_err(|_| CompletionError::Timeout(self.timeout))??;

        if !status.is_success() {
            return Err(CompletionError::Status { status, body });
        }

        parse_completion(&body)
    }

    /// Like [`complete`](Self::complete), but swallows every failure into
    /// [`APOLOGY`]. Blank completions count as failures.
    pub async fn complete_or_apology(&self, conversation: &Conversation) -> String {
        match self.complete(conversation).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("completion API returned blank text, returning apology");
                APOLOGY.to_string()
            }
            Err(err) => {
                tracing::warn!(error = %err, "completion request failed, returning apology");
                APOLOGY.to_string()
            }
        }
    }
}

fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(CompletionError::Malformed)?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(CompletionError::EmptyChoices)
}
