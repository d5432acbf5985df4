use std::sync::Arc;

use dotenvy::dotenv;
use student_backend::{build_app, config::AppConfig, run_server, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let config = AppConfig::from_env();
    if config.ai_configured() {
        tracing::info!(model = %config.model, "AI completion API configured");
    } else {
        tracing::warn!("DEEPSEEK_API_KEY not set; AI endpoints will return placeholder replies");
    }

    let port = config.port;
    let app = build_app(Arc::new(AppState::new(config)));
    run_server(app, port).await?;
    Ok(())
}
