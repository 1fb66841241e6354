use anyhow::Context;
use db::DBService;
use server::{AppState, config::Config, router};
use services::services::claude_api::ClaudeApiClient;
use services::services::generation::GenerationService;
use services::services::usage_log::UsageLogger;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let db = DBService::new(&config.database_url)
        .await
        .context("failed to open database")?;

    let claude = ClaudeApiClient::new(
        config.anthropic_base_url.clone(),
        config.anthropic_api_key.clone(),
        config.anthropic_model.clone(),
    )?;
    let generation = GenerationService::new(claude, UsageLogger::new(&config.log_dir));

    let app = router(AppState { db, generation });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "storydesk listening");
    axum::serve(listener, app).await?;

    Ok(())
}
