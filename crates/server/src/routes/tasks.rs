//! Task CRUD routes.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::{Task, TaskDraft, UpdateTask};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    axum::Json(draft): axum::Json<TaskDraft>,
) -> Result<(StatusCode, ResponseJson<Task>), ApiError> {
    let task = draft.validate(Uuid::new_v4().to_string())?;
    let created = Task::create(&state.db.pool, &task).await?;
    Ok((StatusCode::CREATED, ResponseJson(created)))
}

/// GET /tasks
pub async fn get_all_tasks(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<Task>>, ApiError> {
    Ok(ResponseJson(Task::find_all(&state.db.pool).await?))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<Task>, ApiError> {
    let task = Task::find_by_id(&state.db.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok(ResponseJson(task))
}

/// PUT /tasks/{id}
///
/// Field overrides are merged onto the stored record and the result is
/// revalidated in full before replacing it.
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(patch): axum::Json<UpdateTask>,
) -> Result<ResponseJson<Task>, ApiError> {
    let existing = Task::find_by_id(&state.db.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    let merged = patch.apply_to(&existing).validate(existing.id.clone())?;
    let updated = Task::update(&state.db.pool, &merged)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok(ResponseJson(updated))
}

/// DELETE /tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if Task::delete(&state.db.pool, &id).await? > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Task"))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task).get(get_all_tasks))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}
