use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, json};
use tempfile::TempDir;
use xing::config::XingConfig;
use xing::knowledge::JsonlKnowledgeStore;
use xing::learning::LearningOutcome;
use xing::planner::PlanOutcome;
use xing::{Agent, AgentState, TaskStatus};

use crate::stubs::StubReasoner;

fn config_in(dir: &Path) -> XingConfig {
    let mut config = XingConfig {
        config_path: dir.join("config.toml"),
        workspace_dir: dir.join("workspace"),
        ..XingConfig::default()
    };
    config.planner.default_max_retries = 1;
    config
}

const WRITE_PLAN: &str = r#"{
  "steps": [
    {"id": "draft", "description": "Draft the summary"},
    {"id": "save", "description": "Save the summary", "tool_name": "file_write",
     "parameters": {"path": "summary.txt", "content": "all good"}, "depends_on": ["draft"]}
  ]
}"#;

#[tokio::test]
async fn default_collaborators_deny_writes_and_record_lessons() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let knowledge_path = config.knowledge_path();
    let agent = Agent::builder(config, Arc::new(StubReasoner::new(WRITE_PLAN))).build();

    let response = agent
        .process_request("Write a summary", Map::new())
        .await;

    assert!(!response.success);
    let outcome = response.outcome.as_ref().unwrap();
    assert_eq!(outcome.status, PlanOutcome::Partial);
    assert_eq!(outcome.skipped[0].step_id, "save");
    assert!(!dir.path().join("workspace/summary.txt").exists());

    let experience = response.experience.unwrap();
    assert_eq!(experience.outcome, LearningOutcome::Partial);
    assert!(
        experience
            .lessons_learned
            .contains(&"Review and improve handling of 1 failed step types".to_string())
    );

    let records = JsonlKnowledgeStore::new(knowledge_path).load().await.unwrap();
    assert!(records.iter().any(|r| r.category == "lessons_learned"));
    assert!(records.iter().any(|r| r.category == "performance_metrics"));

    let history = agent.history();
    assert_eq!(history[0].status, TaskStatus::Failed);
    assert_eq!(agent.status().state, AgentState::Idle);
    assert_eq!(agent.insights(Some("summary")).total_experiences, 1);
}

#[tokio::test]
async fn auto_approved_write_lands_in_workspace() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.safety.auto_approve_safe = true;
    config.learning.enabled = false;
    let agent = Agent::builder(config, Arc::new(StubReasoner::new(WRITE_PLAN))).build();

    let mut context = Map::new();
    context.insert("audience".into(), json!("team"));
    let response = agent.process_request("Write a summary", context).await;

    assert!(response.success, "{:?}", response.error);
    assert!(response.experience.is_none());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("workspace/summary.txt")).unwrap(),
        "all good"
    );
    let task = &agent.history()[0];
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.context["audience"], "team");
    assert_eq!(task.result.as_ref().unwrap()["tools_used"], json!(["file_write"]));
}
