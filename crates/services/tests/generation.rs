use db::models::task::{TaskCategory, TaskDraft};
use db::models::user_story::UserStoryDraft;
use serde_json::json;
use services::services::claude_api::ClaudeApiClient;
use services::services::generation::GenerationService;
use services::services::usage_log::{UsageEntry, UsageLogger};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn claude_body(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_01",
        "content": [{"type": "text", "text": text}],
        "model": "claude-sonnet-4-20250514",
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 42, "output_tokens": 7}
    })
}

async fn mock_completion(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_body(text)))
        .mount(server)
        .await;
}

fn service_for(server: &MockServer, logs: &TempDir) -> GenerationService {
    let claude = ClaudeApiClient::new(server.uri(), "test-key".to_string(), None).unwrap();
    GenerationService::new(claude, UsageLogger::new(logs.path()))
}

fn task_draft() -> TaskDraft {
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

fn story() -> db::models::user_story::UserStory {
    UserStoryDraft {
        project: Some("Billing".to_string()),
        rol: Some("account manager".to_string()),
        goal: Some("export invoices".to_string()),
        reason: Some("reconciliation is manual".to_string()),
        description: Some("As an account manager, I want to export invoices.".to_string()),
        priority: Some("medium".to_string()),
        story_points: Some(3),
        effort_hours: Some(4.0),
    }
    .validate("us-1".to_string())
    .unwrap()
}

#[tokio::test]
async fn describe_returns_completion_text_verbatim() {
    let server = MockServer::start().await;
    mock_completion(&server, "Implement the login form with field validation.").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let description = service.generate_task_description(&task_draft()).await.unwrap();
    assert_eq!(description, "Implement the login form with field validation.");
}

#[tokio::test]
async fn categorize_accepts_legal_label() {
    let server = MockServer::start().await;
    mock_completion(&server, "Backend").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let category = service.generate_task_category(&task_draft()).await.unwrap();
    assert_eq!(category, TaskCategory::Backend);
}

#[tokio::test]
async fn categorize_defaults_to_backend_on_unknown_label() {
    let server = MockServer::start().await;
    mock_completion(&server, "NotARealCategory").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let category = service.generate_task_category(&task_draft()).await.unwrap();
    assert_eq!(category, TaskCategory::Backend);
}

#[tokio::test]
async fn estimate_parses_and_rounds_to_one_decimal() {
    let server = MockServer::start().await;
    mock_completion(&server, "6.5").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let hours = service.estimate_effort_hours(&task_draft()).await.unwrap();
    assert_eq!(hours, 6.5);
}

#[tokio::test]
async fn estimate_defaults_on_unparseable_answer() {
    let server = MockServer::start().await;
    mock_completion(&server, "abc").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let hours = service.estimate_effort_hours(&task_draft()).await.unwrap();
    assert_eq!(hours, 4.0);
}

#[tokio::test]
async fn scalar_operation_propagates_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    assert!(service.generate_task_description(&task_draft()).await.is_err());
}

#[tokio::test]
async fn risk_texts_come_back_verbatim() {
    let server = MockServer::start().await;
    mock_completion(&server, "Key risk: unclear requirements.").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let analysis = service.generate_risk_analysis(&task_draft()).await.unwrap();
    assert_eq!(analysis, "Key risk: unclear requirements.");

    let mitigation = service
        .generate_risk_mitigation(&task_draft(), &analysis)
        .await
        .unwrap();
    assert_eq!(mitigation, "Key risk: unclear requirements.");
}

#[tokio::test]
async fn user_story_parses_fenced_structured_output() {
    let server = MockServer::start().await;
    let fenced = r#"```json
{
  "project": "Billing",
  "rol": "account manager",
  "goal": "export invoices",
  "reason": "reconciliation is manual",
  "description": "As an account manager, I want to export invoices so that reconciliation is fast.",
  "priority": "medium",
  "story_points": 3,
  "effort_hours": 4.0
}
```"#;
    mock_completion(&server, fenced).await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let draft = service
        .generate_user_story("I need invoice exports")
        .await
        .unwrap();
    assert_eq!(draft.project.as_deref(), Some("Billing"));
    assert_eq!(draft.story_points, Some(3));
}

#[tokio::test]
async fn user_story_degrades_to_none_on_unparseable_output() {
    let server = MockServer::start().await;
    mock_completion(&server, "I would rather write prose than JSON.").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    assert!(service.generate_user_story("anything").await.is_none());
}

#[tokio::test]
async fn user_story_degrades_to_none_on_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    assert!(service.generate_user_story("anything").await.is_none());
}

#[tokio::test]
async fn generate_tasks_parses_structured_list() {
    let server = MockServer::start().await;
    let body = r#"{"tasks": [
        {"title": "API endpoint", "description": "Build export endpoint", "priority": "high",
         "effort_hours": 3.0, "status": "pending", "assigned_to": "Backend dev", "category": "Backend"},
        {"title": "Export button", "description": "Add button to invoice page", "priority": "medium",
         "effort_hours": 2.0, "status": "pending", "assigned_to": "Frontend dev", "category": "Frontend"}
    ]}"#;
    mock_completion(&server, body).await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);

    let tasks = service.generate_tasks_from_user_story(&story()).await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title.as_deref(), Some("API endpoint"));
    assert!(tasks.iter().all(|t| t.user_story_id.is_none()));
}

#[tokio::test]
async fn generate_tasks_degrades_to_empty_list() {
    let server = MockServer::start().await;
    mock_completion(&server, "no json here").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);
    assert!(service.generate_tasks_from_user_story(&story()).await.is_empty());

    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&failing)
        .await;
    let service = service_for(&failing, &logs);
    assert!(service.generate_tasks_from_user_story(&story()).await.is_empty());
}

#[tokio::test]
async fn every_call_is_accounted_in_the_daily_log() {
    let server = MockServer::start().await;
    mock_completion(&server, "Short description.").await;
    let logs = TempDir::new().unwrap();
    let service = service_for(&server, &logs);
    let logger = UsageLogger::new(logs.path());

    service.generate_task_description(&task_draft()).await.unwrap();

    let content = std::fs::read_to_string(logger.daily_log_path()).unwrap();
    let entries: Vec<UsageEntry> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].endpoint, "/ai/tasks/describe");
    assert_eq!(entries[0].input_tokens, 42);
    assert_eq!(entries[0].output_tokens, 7);
    assert_eq!(entries[0].total_tokens, 49);
    assert_eq!(entries[0].model, "claude-sonnet-4-20250514");
}
