pub mod ai_tasks;
pub mod tasks;
pub mod user_stories;
