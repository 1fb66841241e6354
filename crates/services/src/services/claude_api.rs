//! Claude API client for AI-powered generation.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing configuration: {0} environment variable not set")]
    MissingEnv(&'static str),
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling configuration for one completion call. Every generation
/// operation carries its own fixed set.
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// Request body for Claude API
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
    top_p: f32,
}

/// Content block in response
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

/// Response from Claude API
#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl ClaudeResponse {
    /// Extract the text content from the response
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
        })
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Claude API client
#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClaudeApiClient {
    /// Each call gets exactly one bounded attempt; retrying would change
    /// AI-call cost.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new client from the ANTHROPIC_BASE_URL and ANTHROPIC_API_KEY
    /// environment variables. Absence of either is a startup failure, not a
    /// request-time error.
    pub fn from_env() -> Result<Self, ClaudeApiError> {
        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .map_err(|_| ClaudeApiError::MissingEnv("ANTHROPIC_BASE_URL"))?;
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ClaudeApiError::MissingEnv("ANTHROPIC_API_KEY"))?;
        let model = std::env::var("ANTHROPIC_MODEL").ok();
        Self::new(base_url, api_key, model)
    }

    /// Create a new client for the given endpoint and API key
    pub fn new(
        base_url: String,
        api_key: String,
        model: Option<String>,
    ) -> Result<Self, ClaudeApiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("storydesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClaudeApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Send a completion request to Claude
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        params: CompletionParams,
    ) -> Result<ClaudeResponse, ClaudeApiError> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: params.max_tokens,
            messages,
            system,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let res = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ClaudeResponse>()
                .await
                .map_err(|e| ClaudeApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ClaudeApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ClaudeApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ClaudeApiError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClaudeApiError {
    if e.is_timeout() {
        ClaudeApiError::Timeout
    } else {
        ClaudeApiError::Transport(e.to_string())
    }
}

/// Extract JSON from a string that might contain markdown code blocks
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    // Try to find JSON in code blocks
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Try generic code block
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip past any language identifier on the same line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Return as-is if no code block found
    text
}
