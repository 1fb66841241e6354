//! Process configuration from the environment.

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:storydesk.db";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_base_url: String,
    pub anthropic_api_key: String,
    pub anthropic_model: Option<String>,
    pub database_url: String,
    pub port: u16,
    pub log_dir: PathBuf,
}

impl Config {
    /// The completion endpoint and key are fatal when absent; everything
    /// else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let anthropic_base_url = require("ANTHROPIC_BASE_URL")?;
        let anthropic_api_key = require("ANTHROPIC_API_KEY")?;
        let anthropic_model = std::env::var("ANTHROPIC_MODEL").ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw.clone()))?,
            Err(_) => DEFAULT_PORT,
        };

        let log_dir = std::env::var("LOG_DIR")
            .unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string())
            .into();

        Ok(Self {
            anthropic_base_url,
            anthropic_api_key,
            anthropic_model,
            database_url,
            port,
            log_dir,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}
