//! User-story routes: the record listing consumed by the stories view, plus
//! the whole-record generation endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::Task;
use db::models::user_story::UserStory;
use serde::Deserialize;
use ts_rs::TS;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct GenerateUserStoryRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// GET /user-stories
pub async fn get_user_stories(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<UserStory>>, ApiError> {
    Ok(ResponseJson(UserStory::find_all(&state.db.pool).await?))
}

/// GET /user-stories/{id}/tasks
pub async fn get_user_story_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<Vec<Task>>, ApiError> {
    let story = UserStory::find_by_id(&state.db.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User story"))?;
    let tasks = Task::find_by_user_story_id(&state.db.pool, &story.id).await?;
    Ok(ResponseJson(tasks))
}

/// POST /ai/user-stories
///
/// A degraded generation ("no result") surfaces as a 500; the orchestrator
/// never raises for it.
pub async fn generate_user_story(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<GenerateUserStoryRequest>,
) -> Result<(StatusCode, ResponseJson<UserStory>), ApiError> {
    let prompt = request
        .prompt
        .ok_or_else(|| ApiError::BadRequest("prompt field is required".to_string()))?;

    let draft = state.generation.generate_user_story(&prompt).await.ok_or_else(|| {
        ApiError::Generation("Failed to generate user story. Please try again.".to_string())
    })?;

    let story = draft.validate(Uuid::new_v4().to_string())?;
    let created = UserStory::create(&state.db.pool, &story).await?;
    Ok((StatusCode::CREATED, ResponseJson(created)))
}

/// POST /ai/user-stories/{id}/generate_tasks
///
/// Persists each generated task linked to the story. A degraded generation
/// yields 201 with an empty array.
pub async fn generate_tasks_from_user_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, ResponseJson<Vec<Task>>), ApiError> {
    let story = UserStory::find_by_id(&state.db.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User story"))?;

    let drafts = state.generation.generate_tasks_from_user_story(&story).await;

    let mut created = Vec::with_capacity(drafts.len());
    for mut draft in drafts {
        draft.user_story_id = Some(story.id.clone());
        let task = draft.validate(Uuid::new_v4().to_string())?;
        created.push(Task::create(&state.db.pool, &task).await?);
    }
    Ok((StatusCode::CREATED, ResponseJson(created)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user-stories", get(get_user_stories))
        .route("/user-stories/{id}/tasks", get(get_user_story_tasks))
        .route("/ai/user-stories", post(generate_user_story))
        .route(
            "/ai/user-stories/{id}/generate_tasks",
            post(generate_tasks_from_user_story),
        )
}
