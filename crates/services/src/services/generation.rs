//! Generation operations: prompt assembly from partial records, completion
//! calls with per-operation sampling, result coercion, and usage accounting.
//!
//! Scalar operations (description, category, estimate, risk texts) propagate
//! completion failures to the caller. Whole-record operations degrade
//! locally: a failed or unparseable completion yields "no result" / an empty
//! list, and the failure is logged so degraded calls stay visible.

use db::models::task::{TaskCategory, TaskDraft};
use db::models::user_story::{UserStory, UserStoryDraft};
use db::validation::round_to_tenth;
use serde::Deserialize;
use tracing::warn;

use super::claude_api::{
    ClaudeApiClient, ClaudeApiError, ClaudeResponse, CompletionParams, Message, extract_json,
};
use super::usage_log::UsageLogger;

const ENDPOINT_DESCRIBE: &str = "/ai/tasks/describe";
const ENDPOINT_CATEGORIZE: &str = "/ai/tasks/categorize";
const ENDPOINT_ESTIMATE: &str = "/ai/tasks/estimate";
const ENDPOINT_RISK_ANALYSIS: &str = "/ai/tasks/audit/risk_analysis";
const ENDPOINT_RISK_MITIGATION: &str = "/ai/tasks/audit/risk_mitigation";
const ENDPOINT_USER_STORY: &str = "/ai/user-stories";
const ENDPOINT_GENERATE_TASKS: &str = "/ai/user-stories/generate_tasks";

const SCALAR_PARAMS: CompletionParams = CompletionParams {
    max_tokens: 50,
    temperature: 0.5,
    top_p: 0.5,
};
const RISK_PARAMS: CompletionParams = CompletionParams {
    max_tokens: 200,
    temperature: 0.5,
    top_p: 0.5,
};
const STORY_PARAMS: CompletionParams = CompletionParams {
    max_tokens: 500,
    temperature: 0.7,
    top_p: 0.8,
};
const TASKS_PARAMS: CompletionParams = CompletionParams {
    max_tokens: 800,
    temperature: 0.7,
    top_p: 0.8,
};

const DESCRIBE_SYSTEM: &str =
    "You are a task description generator. These tasks are for a task management system of a \
     software company's development team. Keep the descriptions concise and professional. The \
     fields received are: title, priority, effort_hours, status, assigned_to. From there, \
     generate a good description that can make sense for the task that matches the title and \
     category that comes in the request. The result should not exceed 100 words.";

const CATEGORIZE_SYSTEM: &str =
    "You are a task categorizer. Your task is to determine the most appropriate category for a \
     development task. The categories are: Frontend, Backend, Testing, Infra, and Mobile. You \
     must respond with exactly one of these categories, nothing else.";

const ESTIMATE_SYSTEM: &str =
    "You are a task effort estimator. Your task is to estimate the number of hours needed to \
     complete a development task. Consider the task's title, description and category. Respond \
     with a single number with one decimal place (e.g., 2.5, 4.0, 8.5). The estimate should be \
     realistic and consider the task's scope.";

const RISK_ANALYSIS_SYSTEM: &str =
    "You are a risk analyst for software development tasks. Analyze the potential risks \
     associated with the given task, considering factors like technical complexity, \
     dependencies, resource availability, and project impact. Provide a concise but \
     comprehensive risk analysis that identifies key areas of concern. Generated text should be \
     shorter than 1024 characters.";

const RISK_MITIGATION_SYSTEM: &str =
    "You are a risk mitigation strategist for software development tasks. Based on the provided \
     risk analysis, suggest practical and actionable strategies to mitigate each identified \
     risk. Focus on concrete steps that can be taken to reduce or eliminate the risks while \
     maintaining project quality and timeline. Generated text should be shorter than 1024 \
     characters.";

const USER_STORY_SYSTEM: &str = r#"You are a user story generator for software development projects. Based on the user's prompt, generate a complete user story with all required fields. The user story should follow the format: 'As a [role], I want [goal] so that [reason]'. Make sure all fields are realistic and appropriate for a software development context.

Return ONLY valid JSON with this structure:
```json
{
  "project": "Project name (max 100 characters)",
  "rol": "Who the story is for (max 100 characters)",
  "goal": "What they want (max 300 characters)",
  "reason": "Why they want it (max 300 characters)",
  "description": "As a [role], I want [goal] so that [reason] (max 300 characters)",
  "priority": "low|medium|high|blocking",
  "story_points": 3,
  "effort_hours": 4.0
}
```
story_points must be an integer between 1 and 8."#;

const GENERATE_TASKS_SYSTEM: &str =
    "You are a task generator for software development projects. Based on a user story, generate \
     multiple development tasks that would be needed to implement the feature. Each task should \
     be specific, actionable, and properly categorized. Tasks should cover different aspects \
     like frontend, backend, testing, etc. Output valid JSON only.";

/// Orchestrates the six generation operations. Stateless per call: no
/// operation depends on another's in-flight result.
#[derive(Debug, Clone)]
pub struct GenerationService {
    claude: ClaudeApiClient,
    usage: UsageLogger,
}

#[derive(Debug, Deserialize)]
struct GeneratedTasks {
    tasks: Vec<TaskDraft>,
}

impl GenerationService {
    pub fn new(claude: ClaudeApiClient, usage: UsageLogger) -> Self {
        Self { claude, usage }
    }

    /// Free-text description for a draft task; used verbatim by the caller.
    pub async fn generate_task_description(
        &self,
        task: &TaskDraft,
    ) -> Result<String, ClaudeApiError> {
        let prompt = format!(
            "Generate a concise task description (max 20 words) for a task with title: {}, \
             priority: {}, effort hours: {}, status: {}, assigned to: {} and category: {}",
            text_field(&task.title),
            text_field(&task.priority),
            float_field(task.effort_hours),
            text_field(&task.status),
            text_field(&task.assigned_to),
            text_field(&task.category),
        );
        self.ask(ENDPOINT_DESCRIBE, &prompt, DESCRIBE_SYSTEM, SCALAR_PARAMS)
            .await
    }

    /// Category label for a draft task. An unrecognized label falls back to
    /// Backend.
    pub async fn generate_task_category(
        &self,
        task: &TaskDraft,
    ) -> Result<TaskCategory, ClaudeApiError> {
        let prompt = format!(
            "Based on the following task details, determine the most appropriate category \
             (Frontend, Backend, Testing, Infra, or Mobile):\n\
             Title: {}\n\
             Description: {}\n\
             Priority: {}\n\
             Effort Hours: {}\n\
             Status: {}\n\
             Assigned To: {}",
            text_field(&task.title),
            text_field(&task.description),
            text_field(&task.priority),
            float_field(task.effort_hours),
            text_field(&task.status),
            text_field(&task.assigned_to),
        );
        let label = self
            .ask(ENDPOINT_CATEGORIZE, &prompt, CATEGORIZE_SYSTEM, SCALAR_PARAMS)
            .await?;
        Ok(parse_category(&label))
    }

    /// Effort estimate in hours, one decimal place. An unparseable answer
    /// falls back to 4.0.
    pub async fn estimate_effort_hours(&self, task: &TaskDraft) -> Result<f64, ClaudeApiError> {
        let prompt = format!(
            "Based on the following task details, estimate the effort hours needed (respond \
             with a single number with one decimal place):\n\
             Title: {}\n\
             Description: {}\n\
             Category: {}",
            text_field(&task.title),
            text_field(&task.description),
            text_field(&task.category),
        );
        let answer = self
            .ask(ENDPOINT_ESTIMATE, &prompt, ESTIMATE_SYSTEM, SCALAR_PARAMS)
            .await?;
        Ok(parse_effort(&answer))
    }

    pub async fn generate_risk_analysis(&self, task: &TaskDraft) -> Result<String, ClaudeApiError> {
        let prompt = format!(
            "Analyze the potential risks for the following task:\n{}",
            task_details(task)
        );
        self.ask(ENDPOINT_RISK_ANALYSIS, &prompt, RISK_ANALYSIS_SYSTEM, RISK_PARAMS)
            .await
    }

    /// Mitigation strategies; consumes the just-produced risk analysis.
    pub async fn generate_risk_mitigation(
        &self,
        task: &TaskDraft,
        risk_analysis: &str,
    ) -> Result<String, ClaudeApiError> {
        let prompt = format!(
            "Based on the following task details and risk analysis, provide risk mitigation \
             strategies:\n\
             Task Details:\n{}\n\n\
             Risk Analysis:\n{risk_analysis}",
            task_details(task)
        );
        self.ask(
            ENDPOINT_RISK_MITIGATION,
            &prompt,
            RISK_MITIGATION_SYSTEM,
            RISK_PARAMS,
        )
        .await
    }

    /// Whole-record generation from a free-text prompt. Yields None when the
    /// completion fails or does not parse; never propagates the error.
    pub async fn generate_user_story(&self, prompt: &str) -> Option<UserStoryDraft> {
        match self
            .ask_structured::<UserStoryDraft>(ENDPOINT_USER_STORY, prompt, USER_STORY_SYSTEM, STORY_PARAMS)
            .await
        {
            Ok(Some(draft)) => Some(draft),
            Ok(None) => {
                warn!("user story generation produced no parseable result");
                None
            }
            Err(e) => {
                warn!(error = %e, "user story generation failed");
                None
            }
        }
    }

    /// 3-5 implementation tasks for a user story, without ids or story
    /// linkage. Yields an empty list when the completion fails or does not
    /// parse.
    pub async fn generate_tasks_from_user_story(&self, story: &UserStory) -> Vec<TaskDraft> {
        let prompt = format!(
            r#"Based on the following user story, generate 3-5 development tasks that would be needed to implement this feature:

User Story:
- Project: {}
- Role: {}
- Goal: {}
- Reason: {}
- Description: {}
- Priority: {}
- Story Points: {}
- Effort Hours: {}

Generate tasks that cover different aspects of the implementation (frontend, backend, testing, etc.) and ensure they are properly sized and categorized.

## Output Format
Return ONLY valid JSON:
```json
{{
  "tasks": [
    {{
      "title": "Short task title",
      "description": "What to build (max 1000 characters)",
      "priority": "low|medium|high|blocking",
      "effort_hours": 2.5,
      "status": "pending",
      "assigned_to": "Role or person",
      "category": "Frontend|Backend|Testing|Infra|Mobile"
    }}
  ]
}}
```"#,
            story.project,
            story.rol,
            story.goal,
            story.reason,
            story.description,
            story.priority,
            story.story_points,
            story.effort_hours,
        );

        match self
            .ask_structured::<GeneratedTasks>(
                ENDPOINT_GENERATE_TASKS,
                &prompt,
                GENERATE_TASKS_SYSTEM,
                TASKS_PARAMS,
            )
            .await
        {
            Ok(Some(parsed)) => parsed.tasks,
            Ok(None) => {
                warn!(user_story_id = %story.id, "task generation produced no parseable result");
                Vec::new()
            }
            Err(e) => {
                warn!(user_story_id = %story.id, error = %e, "task generation failed");
                Vec::new()
            }
        }
    }

    async fn ask(
        &self,
        endpoint: &str,
        prompt: &str,
        system: &str,
        params: CompletionParams,
    ) -> Result<String, ClaudeApiError> {
        let response = self
            .claude
            .complete(vec![Message::user(prompt)], Some(system.to_string()), params)
            .await?;
        self.record_usage(endpoint, &response);

        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| ClaudeApiError::Serde("no text content in response".to_string()))
    }

    /// Structured completion: text mode plus fenced-JSON extraction. A parse
    /// miss is an absent outcome, not an error; usage is accounted either way.
    async fn ask_structured<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        prompt: &str,
        system: &str,
        params: CompletionParams,
    ) -> Result<Option<T>, ClaudeApiError> {
        let response = self
            .claude
            .complete(vec![Message::user(prompt)], Some(system.to_string()), params)
            .await?;
        self.record_usage(endpoint, &response);

        let Some(text) = response.text() else {
            return Ok(None);
        };
        Ok(serde_json::from_str(extract_json(text)).ok())
    }

    fn record_usage(&self, endpoint: &str, response: &ClaudeResponse) {
        if let Err(e) = self.usage.record(
            endpoint,
            response.usage.input_tokens,
            response.usage.output_tokens,
            &response.model,
        ) {
            warn!(endpoint = %endpoint, error = %e, "failed to record token usage");
        }
    }
}

fn text_field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn float_field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn task_details(task: &TaskDraft) -> String {
    format!(
        "Title: {}\n\
         Description: {}\n\
         Priority: {}\n\
         Effort Hours: {}\n\
         Status: {}\n\
         Assigned To: {}\n\
         Category: {}",
        text_field(&task.title),
        text_field(&task.description),
        text_field(&task.priority),
        float_field(task.effort_hours),
        text_field(&task.status),
        text_field(&task.assigned_to),
        text_field(&task.category),
    )
}

fn parse_category(label: &str) -> TaskCategory {
    label.trim().parse().unwrap_or(TaskCategory::Backend)
}

fn parse_effort(answer: &str) -> f64 {
    answer
        .trim()
        .parse::<f64>()
        .map(round_to_tenth)
        .unwrap_or(4.0)
}
