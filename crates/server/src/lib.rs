//! HTTP surface: routes map 1:1 onto store and generation operations.

use axum::Router;
use db::DBService;
use services::services::generation::GenerationService;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub generation: GenerationService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::tasks::router())
        .merge(routes::ai_tasks::router())
        .merge(routes::user_stories::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
