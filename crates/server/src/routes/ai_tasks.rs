//! AI-assisted task creation: each route derives one or two fields with a
//! generation operation, merges them into the submitted draft, then persists
//! through the same validation path as a plain create.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use db::models::task::{Task, TaskDraft};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// POST /ai/tasks/describe
pub async fn describe_task(
    State(state): State<AppState>,
    axum::Json(mut draft): axum::Json<TaskDraft>,
) -> Result<(StatusCode, ResponseJson<Task>), ApiError> {
    let description = state.generation.generate_task_description(&draft).await?;
    draft.description = Some(description);
    persist(&state, draft).await
}

/// POST /ai/tasks/categorize
pub async fn categorize_task(
    State(state): State<AppState>,
    axum::Json(mut draft): axum::Json<TaskDraft>,
) -> Result<(StatusCode, ResponseJson<Task>), ApiError> {
    let category = state.generation.generate_task_category(&draft).await?;
    draft.category = Some(category.to_string());
    persist(&state, draft).await
}

/// POST /ai/tasks/estimate
pub async fn estimate_task(
    State(state): State<AppState>,
    axum::Json(mut draft): axum::Json<TaskDraft>,
) -> Result<(StatusCode, ResponseJson<Task>), ApiError> {
    let effort_hours = state.generation.estimate_effort_hours(&draft).await?;
    draft.effort_hours = Some(effort_hours);
    persist(&state, draft).await
}

/// POST /ai/tasks/audit
///
/// Produces risk_analysis and risk_mitigation in one call; the mitigation
/// prompt consumes the just-generated analysis.
pub async fn audit_task(
    State(state): State<AppState>,
    axum::Json(mut draft): axum::Json<TaskDraft>,
) -> Result<(StatusCode, ResponseJson<Task>), ApiError> {
    let risk_analysis = state.generation.generate_risk_analysis(&draft).await?;
    let risk_mitigation = state
        .generation
        .generate_risk_mitigation(&draft, &risk_analysis)
        .await?;
    draft.risk_analysis = Some(risk_analysis);
    draft.risk_mitigation = Some(risk_mitigation);
    persist(&state, draft).await
}

async fn persist(
    state: &AppState,
    draft: TaskDraft,
) -> Result<(StatusCode, ResponseJson<Task>), ApiError> {
    let task = draft.validate(Uuid::new_v4().to_string())?;
    let created = Task::create(&state.db.pool, &task).await?;
    Ok((StatusCode::CREATED, ResponseJson(created)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/ai/tasks",
        Router::new()
            .route("/describe", post(describe_task))
            .route("/categorize", post(categorize_task))
            .route("/estimate", post(estimate_task))
            .route("/audit", post(audit_task)),
    )
}
