use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

use super::task::Priority;
use crate::validation::{ValidationErrors, Violations, round_to_tenth};

pub const PROJECT_MAX: usize = 100;
pub const ROL_MAX: usize = 100;
pub const GOAL_MAX: usize = 300;
pub const REASON_MAX: usize = 300;
pub const DESCRIPTION_MAX: usize = 300;
pub const STORY_POINTS_MIN: i64 = 1;
pub const STORY_POINTS_MAX: i64 = 8;

/// A feature-level requirement: "as a [rol], I want [goal] so that [reason]".
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct UserStory {
    pub id: String,
    pub project: String,
    pub rol: String,
    pub goal: String,
    pub reason: String,
    pub description: String,
    pub priority: Priority,
    pub story_points: i64,
    /// Normalized to one decimal place on construction.
    pub effort_hours: f64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Raw UserStory fields prior to validation; this is also the shape the
/// structured completion is parsed into.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct UserStoryDraft {
    pub project: Option<String>,
    pub rol: Option<String>,
    pub goal: Option<String>,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub story_points: Option<i64>,
    pub effort_hours: Option<f64>,
}

impl UserStoryDraft {
    pub fn validate(self, id: String) -> Result<UserStory, ValidationErrors> {
        let mut v = Violations::default();

        let project = required_text(&mut v, "project", self.project, PROJECT_MAX);
        let rol = required_text(&mut v, "rol", self.rol, ROL_MAX);
        let goal = required_text(&mut v, "goal", self.goal, GOAL_MAX);
        let reason = required_text(&mut v, "reason", self.reason, REASON_MAX);
        let description = required_text(&mut v, "description", self.description, DESCRIPTION_MAX);

        let priority = match self.priority {
            None => {
                v.missing("priority");
                None
            }
            Some(raw) => match raw.parse::<Priority>() {
                Ok(priority) => Some(priority),
                Err(_) => {
                    v.not_a_member("priority", &raw);
                    None
                }
            },
        };

        let story_points = match self.story_points {
            None => {
                v.missing("story_points");
                None
            }
            Some(points) if !(STORY_POINTS_MIN..=STORY_POINTS_MAX).contains(&points) => {
                v.out_of_range(
                    "story_points",
                    format!("must be between {STORY_POINTS_MIN} and {STORY_POINTS_MAX}"),
                );
                None
            }
            Some(points) => Some(points),
        };

        // Rounding is part of successful construction, not a separate pass.
        let effort_hours = match self.effort_hours {
            None => {
                v.missing("effort_hours");
                None
            }
            Some(hours) => Some(round_to_tenth(hours)),
        };

        match (
            project,
            rol,
            goal,
            reason,
            description,
            priority,
            story_points,
            effort_hours,
        ) {
            (
                Some(project),
                Some(rol),
                Some(goal),
                Some(reason),
                Some(description),
                Some(priority),
                Some(story_points),
                Some(effort_hours),
            ) if v.is_empty() => Ok(UserStory {
                id,
                project,
                rol,
                goal,
                reason,
                description,
                priority,
                story_points,
                effort_hours,
                created_at: None,
            }),
            _ => Err(v.into_errors()),
        }
    }
}

fn required_text(
    v: &mut Violations,
    field: &str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    match value {
        None => {
            v.missing(field);
            None
        }
        Some(text) => {
            v.check_len(field, &text, max);
            Some(text)
        }
    }
}

const STORY_COLUMNS: &str =
    "id, project, rol, goal, reason, description, priority, story_points, effort_hours, created_at";

impl UserStory {
    pub async fn create(pool: &SqlitePool, story: &UserStory) -> Result<UserStory, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_stories ({STORY_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {STORY_COLUMNS}"
        );
        sqlx::query_as::<_, UserStory>(&query)
            .bind(&story.id)
            .bind(&story.project)
            .bind(&story.rol)
            .bind(&story.goal)
            .bind(&story.reason)
            .bind(&story.description)
            .bind(story.priority)
            .bind(story.story_points)
            .bind(story.effort_hours)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<UserStory>, sqlx::Error> {
        let query = format!("SELECT {STORY_COLUMNS} FROM user_stories WHERE id = $1");
        sqlx::query_as::<_, UserStory>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<UserStory>, sqlx::Error> {
        let query = format!("SELECT {STORY_COLUMNS} FROM user_stories");
        sqlx::query_as::<_, UserStory>(&query).fetch_all(pool).await
    }

    pub async fn update(
        pool: &SqlitePool,
        story: &UserStory,
    ) -> Result<Option<UserStory>, sqlx::Error> {
        let query = format!(
            "UPDATE user_stories
             SET project = $2, rol = $3, goal = $4, reason = $5, description = $6, priority = $7,
                 story_points = $8, effort_hours = $9
             WHERE id = $1
             RETURNING {STORY_COLUMNS}"
        );
        sqlx::query_as::<_, UserStory>(&query)
            .bind(&story.id)
            .bind(&story.project)
            .bind(&story.rol)
            .bind(&story.goal)
            .bind(&story.reason)
            .bind(&story.description)
            .bind(story.priority)
            .bind(story.story_points)
            .bind(story.effort_hours)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_stories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ViolationKind;

    fn draft() -> UserStoryDraft {
        UserStoryDraft {
            project: Some("Billing".to_string()),
            rol: Some("account manager".to_string()),
            goal: Some("export invoices".to_string()),
            reason: Some("monthly reconciliation takes hours".to_string()),
            description: Some(
                "As an account manager, I want to export invoices so that \
                 monthly reconciliation takes minutes."
                    .to_string(),
            ),
            priority: Some("medium".to_string()),
            story_points: Some(3),
            effort_hours: Some(4.0),
        }
    }

    #[test]
    fn valid_draft_produces_user_story() {
        let story = draft().validate("us-1".to_string()).unwrap();
        assert_eq!(story.priority, Priority::Medium);
        assert_eq!(story.story_points, 3);
        assert!(story.created_at.is_none());
    }

    #[test]
    fn story_points_boundaries() {
        for points in [1, 8] {
            let mut d = draft();
            d.story_points = Some(points);
            assert!(d.validate("us-1".to_string()).is_ok(), "{points} rejected");
        }
        for points in [0, 9, -3] {
            let mut d = draft();
            d.story_points = Some(points);
            let errors = d.validate("us-1".to_string()).unwrap_err();
            assert_eq!(errors.errors[0].field, "story_points");
            assert_eq!(errors.errors[0].kind, ViolationKind::OutOfRange);
        }
    }

    #[test]
    fn effort_hours_are_rounded_on_construction() {
        for (input, expected) in [(4.123, 4.1), (4.567, 4.6), (4.999, 5.0), (4.0, 4.0)] {
            let mut d = draft();
            d.effort_hours = Some(input);
            let story = d.validate("us-1".to_string()).unwrap();
            assert_eq!(story.effort_hours, expected);
        }
    }

    #[test]
    fn text_ceilings_are_enforced() {
        let cases = [
            ("project", 101),
            ("rol", 101),
            ("goal", 301),
            ("reason", 301),
            ("description", 301),
        ];
        for (field, len) in cases {
            let mut d = draft();
            let text = Some("x".repeat(len));
            match field {
                "project" => d.project = text,
                "rol" => d.rol = text,
                "goal" => d.goal = text,
                "reason" => d.reason = text,
                _ => d.description = text,
            }
            let errors = d.validate("us-1".to_string()).unwrap_err();
            assert_eq!(errors.errors[0].field, field);
            assert_eq!(errors.errors[0].kind, ViolationKind::TooLong);
        }
    }

    #[test]
    fn invalid_priority_is_rejected() {
        let mut d = draft();
        d.priority = Some("urgent".to_string());
        let errors = d.validate("us-1".to_string()).unwrap_err();
        assert_eq!(errors.errors[0].field, "priority");
        assert_eq!(errors.errors[0].kind, ViolationKind::NotAMember);
    }
}
