use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub upload_dir: PathBuf,
    pub cleanup_delay_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(10_000);

        let api_key = env::var("DEEPSEEK_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let api_url = env::var("DEEPSEEK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let timeout_ms = env::var("AI_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(30_000);

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let cleanup_delay_ms = env::var("UPLOAD_CLEANUP_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(5_000);

        Self {
            port,
            api_key,
            api_url,
            model,
            timeout_ms,
            upload_dir,
            cleanup_delay_ms,
        }
    }

    pub fn ai_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 10_000,
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: 30_000,
            upload_dir: PathBuf::from("uploads"),
            cleanup_delay_ms: 5_000,
        }
    }
}
