use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use crate::validation::{ValidationErrors, Violations};

pub const TASK_DESCRIPTION_MAX: usize = 1000;
pub const RISK_TEXT_MAX: usize = 1024;

/// Shared by tasks and user stories.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Blocking,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    #[sqlx(rename = "in progress")]
    #[serde(rename = "in progress")]
    #[strum(serialize = "in progress")]
    InProgress,
    #[sqlx(rename = "in review")]
    #[serde(rename = "in review")]
    #[strum(serialize = "in review")]
    InReview,
    Completed,
}

/// Development area a task belongs to. Labels are capitalized on the wire,
/// exactly as the variants are spelled.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_category")]
pub enum TaskCategory {
    Frontend,
    #[default]
    Backend,
    Testing,
    Infra,
    Mobile,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub effort_hours: f64,
    pub status: TaskStatus,
    pub assigned_to: String,
    pub category: TaskCategory,
    pub user_story_id: Option<String>,
    pub risk_analysis: Option<String>,
    pub risk_mitigation: Option<String>,
    /// Assigned by the store at persistence time, immutable afterwards.
    pub created_at: Option<DateTime<Utc>>,
}

/// Raw Task fields as they arrive from the wire or from the completion API.
/// Enum fields stay strings until validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct TaskDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub effort_hours: Option<f64>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Option<String>,
    pub user_story_id: Option<String>,
    pub risk_analysis: Option<String>,
    pub risk_mitigation: Option<String>,
}

impl TaskDraft {
    /// Relabel an existing record as a draft; typed values re-enter
    /// validation through their serialized labels.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            priority: Some(task.priority.to_string()),
            effort_hours: Some(task.effort_hours),
            status: Some(task.status.to_string()),
            assigned_to: Some(task.assigned_to.clone()),
            category: Some(task.category.to_string()),
            user_story_id: task.user_story_id.clone(),
            risk_analysis: task.risk_analysis.clone(),
            risk_mitigation: task.risk_mitigation.clone(),
        }
    }

    /// All-or-nothing validation: returns either a well-formed Task (without
    /// a created_at, which only the store assigns) or every field violation.
    /// The id is minted by the caller; drafts never carry one.
    pub fn validate(self, id: String) -> Result<Task, ValidationErrors> {
        let mut v = Violations::default();

        let title = match self.title {
            Some(title) => Some(title),
            None => {
                v.missing("title");
                None
            }
        };

        let description = match self.description {
            Some(description) => {
                v.check_len("description", &description, TASK_DESCRIPTION_MAX);
                Some(description)
            }
            None => {
                v.missing("description");
                None
            }
        };

        let priority = parse_member::<Priority>(&mut v, "priority", self.priority);

        // No range check on effort: the boundary layer has never enforced
        // one, and negative values remain accepted.
        let effort_hours = match self.effort_hours {
            Some(hours) => Some(hours),
            None => {
                v.missing("effort_hours");
                None
            }
        };

        let status = parse_member::<TaskStatus>(&mut v, "status", self.status);

        let assigned_to = match self.assigned_to {
            Some(assigned_to) => Some(assigned_to),
            None => {
                v.missing("assigned_to");
                None
            }
        };

        let category = parse_member::<TaskCategory>(&mut v, "category", self.category);

        if let Some(risk_analysis) = self.risk_analysis.as_deref() {
            v.check_len("risk_analysis", risk_analysis, RISK_TEXT_MAX);
        }
        if let Some(risk_mitigation) = self.risk_mitigation.as_deref() {
            v.check_len("risk_mitigation", risk_mitigation, RISK_TEXT_MAX);
        }

        match (
            title,
            description,
            priority,
            effort_hours,
            status,
            assigned_to,
            category,
        ) {
            (
                Some(title),
                Some(description),
                Some(priority),
                Some(effort_hours),
                Some(status),
                Some(assigned_to),
                Some(category),
            ) if v.is_empty() => Ok(Task {
                id,
                title,
                description,
                priority,
                effort_hours,
                status,
                assigned_to,
                category,
                user_story_id: self.user_story_id,
                risk_analysis: self.risk_analysis,
                risk_mitigation: self.risk_mitigation,
                created_at: None,
            }),
            _ => Err(v.into_errors()),
        }
    }
}

/// Explicit patch for replace-on-update: each field is applied only when
/// present, then the merged record is revalidated in full.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub effort_hours: Option<f64>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Option<String>,
    pub user_story_id: Option<String>,
    pub risk_analysis: Option<String>,
    pub risk_mitigation: Option<String>,
}

impl UpdateTask {
    pub fn apply_to(self, task: &Task) -> TaskDraft {
        let base = TaskDraft::from_task(task);
        TaskDraft {
            title: self.title.or(base.title),
            description: self.description.or(base.description),
            priority: self.priority.or(base.priority),
            effort_hours: self.effort_hours.or(base.effort_hours),
            status: self.status.or(base.status),
            assigned_to: self.assigned_to.or(base.assigned_to),
            category: self.category.or(base.category),
            user_story_id: self.user_story_id.or(base.user_story_id),
            risk_analysis: self.risk_analysis.or(base.risk_analysis),
            risk_mitigation: self.risk_mitigation.or(base.risk_mitigation),
        }
    }
}

fn parse_member<T: std::str::FromStr>(
    v: &mut Violations,
    field: &str,
    value: Option<String>,
) -> Option<T> {
    match value {
        None => {
            v.missing(field);
            None
        }
        Some(raw) => match raw.parse::<T>() {
            Ok(member) => Some(member),
            Err(_) => {
                v.not_a_member(field, &raw);
                None
            }
        },
    }
}

const TASK_COLUMNS: &str = "id, title, description, priority, effort_hours, status, assigned_to, \
                            category, user_story_id, risk_analysis, risk_mitigation, created_at";

impl Task {
    /// Insert and return the stored row. A duplicate id is rejected by the
    /// primary key.
    pub async fn create(pool: &SqlitePool, task: &Task) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks ({TASK_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.priority)
            .bind(task.effort_hours)
            .bind(task.status)
            .bind(&task.assigned_to)
            .bind(task.category)
            .bind(&task.user_story_id)
            .bind(&task.risk_analysis)
            .bind(&task.risk_mitigation)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks");
        sqlx::query_as::<_, Task>(&query).fetch_all(pool).await
    }

    /// Tasks whose user_story_id equals the argument exactly; unlinked tasks
    /// never match.
    pub async fn find_by_user_story_id(
        pool: &SqlitePool,
        user_story_id: &str,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_story_id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(user_story_id)
            .fetch_all(pool)
            .await
    }

    /// Full-record replace. Returns the re-read stored row so that
    /// server-assigned created_at is reflected, or None if absent.
    pub async fn update(pool: &SqlitePool, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks
             SET title = $2, description = $3, priority = $4, effort_hours = $5, status = $6,
                 assigned_to = $7, category = $8, user_story_id = $9, risk_analysis = $10,
                 risk_mitigation = $11
             WHERE id = $1
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.priority)
            .bind(task.effort_hours)
            .bind(task.status)
            .bind(&task.assigned_to)
            .bind(task.category)
            .bind(&task.user_story_id)
            .bind(&task.risk_analysis)
            .bind(&task.risk_mitigation)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
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

    fn draft() -> TaskDraft {
        TaskDraft {
            title: Some("Build login form".to_string()),
            description: Some("React login form with validation".to_string()),
            priority: Some("high".to_string()),
            effort_hours: Some(2.5),
            status: Some("pending".to_string()),
            assigned_to: Some("Ana".to_string()),
            category: Some("Frontend".to_string()),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn valid_draft_produces_task() {
        let task = draft().validate("t-1".to_string()).unwrap();
        assert_eq!(task.id, "t-1");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.category, TaskCategory::Frontend);
        assert!(task.created_at.is_none());
    }

    #[test]
    fn description_at_limit_is_accepted() {
        let mut d = draft();
        d.description = Some("x".repeat(1000));
        assert!(d.validate("t-1".to_string()).is_ok());
    }

    #[test]
    fn description_over_limit_is_rejected() {
        let mut d = draft();
        d.description = Some("x".repeat(1001));
        let errors = d.validate("t-1".to_string()).unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].field, "description");
        assert_eq!(errors.errors[0].kind, ViolationKind::TooLong);
    }

    #[test]
    fn invalid_category_is_rejected() {
        let mut d = draft();
        d.category = Some("invalid_category".to_string());
        let errors = d.validate("t-1".to_string()).unwrap_err();
        assert_eq!(errors.errors[0].field, "category");
        assert_eq!(errors.errors[0].kind, ViolationKind::NotAMember);
    }

    #[test]
    fn all_violations_are_reported_together() {
        let mut d = draft();
        d.priority = Some("urgent".to_string());
        d.status = Some("done".to_string());
        d.description = Some("x".repeat(1001));
        let errors = d.validate("t-1".to_string()).unwrap_err();
        let fields: Vec<&str> = errors.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["description", "priority", "status"]);
    }

    #[test]
    fn missing_fields_are_reported() {
        let errors = TaskDraft::default()
            .validate("t-1".to_string())
            .unwrap_err();
        assert!(
            errors
                .errors
                .iter()
                .all(|e| e.kind == ViolationKind::Missing)
        );
        assert!(errors.errors.iter().any(|e| e.field == "title"));
        assert!(errors.errors.iter().any(|e| e.field == "effort_hours"));
    }

    #[test]
    fn negative_effort_hours_are_accepted() {
        let mut d = draft();
        d.effort_hours = Some(-1.0);
        let task = d.validate("t-1".to_string()).unwrap();
        assert_eq!(task.effort_hours, -1.0);
    }

    #[test]
    fn spaced_status_labels_round_trip() {
        let mut d = draft();
        d.status = Some("in progress".to_string());
        let task = d.validate("t-1".to_string()).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.status.to_string(), "in progress");
        assert_eq!(
            serde_json::to_value(task.status).unwrap(),
            serde_json::json!("in progress")
        );
    }

    #[test]
    fn risk_text_over_limit_is_rejected() {
        let mut d = draft();
        d.risk_analysis = Some("r".repeat(1025));
        let errors = d.validate("t-1".to_string()).unwrap_err();
        assert_eq!(errors.errors[0].field, "risk_analysis");
    }

    #[test]
    fn update_patch_preserves_unpatched_fields() {
        let task = draft().validate("t-1".to_string()).unwrap();
        let patch = UpdateTask {
            title: Some("Build signup form".to_string()),
            ..UpdateTask::default()
        };
        let merged = patch.apply_to(&task).validate(task.id.clone()).unwrap();
        assert_eq!(merged.title, "Build signup form");
        assert_eq!(merged.description, task.description);
        assert_eq!(merged.priority, task.priority);
        assert_eq!(merged.effort_hours, task.effort_hours);
        assert_eq!(merged.assigned_to, task.assigned_to);
    }

    #[test]
    fn update_patch_is_revalidated() {
        let task = draft().validate("t-1".to_string()).unwrap();
        let patch = UpdateTask {
            category: Some("NotARealCategory".to_string()),
            ..UpdateTask::default()
        };
        let errors = patch.apply_to(&task).validate(task.id.clone()).unwrap_err();
        assert_eq!(errors.errors[0].field, "category");
    }
}
