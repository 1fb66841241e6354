use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use db::validation::ValidationErrors;
use serde_json::json;
use services::services::claude_api::ClaudeApiError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Generation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    ClaudeApi(#[from] ClaudeApiError),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            // Validation failures enumerate every violated field; they are
            // never surfaced as raw serialization text.
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, json!({ "error": errors.errors }))
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::Generation(message) => {
                error!(error = %message, "generation produced no result");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message }),
                )
            }
            ApiError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": e.to_string() }),
                )
            }
            ApiError::ClaudeApi(e) => {
                error!(error = %e, "completion call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": e.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
