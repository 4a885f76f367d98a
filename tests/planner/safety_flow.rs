use std::sync::Arc;

use serde_json::{Map, json};
use tempfile::TempDir;
use xing::planner::{PlanOutcome, PlanStep, StepStatus};
use xing::safety::{
    ApprovalBroker, ApprovalDecision, ApprovalRequest, RiskLevel, RuleSafetyGate,
};
use xing::tools::ToolRegistry;
use xing::{ExecutionPlan, PlanExecutor};

use crate::stubs::{StubReasoner, executor, reasoning_step};

fn write_step(path: &str) -> PlanStep {
    let mut params = Map::new();
    params.insert("path".into(), json!(path));
    params.insert("content".into(), json!("report body"));
    PlanStep::tool_call("Save the report", "file_write", params).with_id("save")
}

fn plan_with_write(path: &str) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new("task-safety");
    plan.add_step(write_step(path)).unwrap();
    plan.add_step(reasoning_step("announce", &["save"])).unwrap();
    plan
}

struct ApproveEverything;

#[async_trait::async_trait]
impl ApprovalBroker for ApproveEverything {
    async fn request_approval(&self, request: &ApprovalRequest) -> anyhow::Result<ApprovalDecision> {
        assert_eq!(request.tool_name.as_deref(), Some("file_write"));
        Ok(ApprovalDecision::Approved)
    }
}

#[tokio::test]
async fn denied_file_write_is_skipped_and_nothing_is_written() {
    let workspace = TempDir::new().unwrap();
    let tools = Arc::new(ToolRegistry::with_builtin_tools(workspace.path()));
    let reasoner = Arc::new(StubReasoner::new(""));
    let mut plan = plan_with_write("out/report.txt");

    let outcome = executor(
        Arc::new(RuleSafetyGate::new(RiskLevel::High, false)),
        tools,
        reasoner.clone(),
    )
    .execute(&mut plan)
    .await;

    assert_eq!(plan.get_step("save").unwrap().status, StepStatus::Skipped);
    assert!(!workspace.path().join("out/report.txt").exists());
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].step_id, "save");
    assert!(outcome.skipped[0].reason.starts_with("File write operations require approval"));
    assert_eq!(outcome.status, PlanOutcome::Blocked);
    assert!(reasoner.executed().is_empty());

    let progress = plan.get_progress();
    assert_eq!(progress.total_steps, 2);
    assert_eq!(progress.skipped_steps, 1);
    assert_eq!(progress.completed_steps, 0);
}

#[tokio::test]
async fn human_approval_lets_the_write_through() {
    let workspace = TempDir::new().unwrap();
    let tools = Arc::new(ToolRegistry::with_builtin_tools(workspace.path()));
    let reasoner = Arc::new(StubReasoner::new(""));
    let mut plan = plan_with_write("out/report.txt");

    let outcome = PlanExecutor::new(
        Arc::new(RuleSafetyGate::new(RiskLevel::High, false)),
        Arc::new(ApproveEverything),
        tools,
        reasoner.clone(),
    )
    .execute(&mut plan)
    .await;

    assert!(outcome.success(), "{outcome:?}");
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("out/report.txt")).unwrap(),
        "report body"
    );
    assert!(outcome.tools_used.contains("file_write"));
    assert_eq!(reasoner.executed(), vec!["announce"]);
}

#[tokio::test]
async fn auto_approve_allows_plain_writes_at_high_level() {
    let workspace = TempDir::new().unwrap();
    let tools = Arc::new(ToolRegistry::with_builtin_tools(workspace.path()));
    let mut plan = plan_with_write("report.txt");

    let outcome = executor(
        Arc::new(RuleSafetyGate::new(RiskLevel::High, true)),
        tools,
        Arc::new(StubReasoner::new("")),
    )
    .execute(&mut plan)
    .await;

    assert!(outcome.success());
    assert!(workspace.path().join("report.txt").exists());
}

#[tokio::test]
async fn critical_level_blocks_writes_even_with_auto_approve() {
    let workspace = TempDir::new().unwrap();
    let tools = Arc::new(ToolRegistry::with_builtin_tools(workspace.path()));
    let mut plan = plan_with_write("report.txt");

    let outcome = executor(
        Arc::new(RuleSafetyGate::new(RiskLevel::Critical, true)),
        tools,
        Arc::new(StubReasoner::new("")),
    )
    .execute(&mut plan)
    .await;

    assert!(!outcome.success());
    assert_eq!(plan.get_step("save").unwrap().status, StepStatus::Skipped);
    assert!(!workspace.path().join("report.txt").exists());
}
