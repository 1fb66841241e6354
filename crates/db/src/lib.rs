//! SQLite-backed storage for storydesk records.

use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use thiserror::Error;

pub mod models;
pub mod validation;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Connection pool handle passed through application state. Referential
/// integrity for `tasks.user_story_id` is deliberately left unenforced:
/// deleting a user story neither cascades nor fails, and dangling
/// references are allowed to persist.
#[derive(Debug, Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Open the database at `database_url`, creating it if missing, and
    /// bring the schema up to date.
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(false);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Fresh in-memory database. Capped at one connection: each pooled
    /// connection would otherwise open its own empty database.
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}
