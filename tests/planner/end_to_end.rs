use std::sync::Arc;

use tempfile::TempDir;
use xing::config::PlannerConfig;
use xing::planner::{DraftSource, PlanOutcome, StepStatus, StepType, TaskPlanner};
use xing::safety::{AutoDenyBroker, RiskLevel, RuleSafetyGate};
use xing::tools::ToolRegistry;
use xing::{PlanExecutor, Task};

use crate::stubs::StubReasoner;

const READ_THEN_SUMMARISE: &str = r#"Sure, here is my plan.
{
  "plan_description": "Read the notes and summarise them",
  "steps": [
    {
      "id": "fetch",
      "description": "Read the notes file",
      "step_type": "tool_call",
      "tool_name": "file_read",
      "parameters": {"path": "notes.txt"},
      "estimated_duration": 5
    },
    {
      "id": "summarise",
      "description": "Summarise the notes",
      "step_type": "synthesis",
      "depends_on": [1],
      "estimated_duration": "20 seconds"
    }
  ]
}
Let me know if you need anything else."#;

#[tokio::test]
async fn two_step_plan_runs_tool_then_reasoning() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("notes.txt"), "hello notes").unwrap();

    let reasoner = Arc::new(StubReasoner::new(READ_THEN_SUMMARISE).classified_as("Analytical."));
    let registry = Arc::new(ToolRegistry::with_builtin_tools(workspace.path()));
    let planner = TaskPlanner::new(reasoner.clone(), &PlannerConfig::default())
        .with_known_tools(["file_read", "file_write"]);
    let task = Task::new("Summarise my notes");

    let mut plan = planner.create_plan(&task).await.unwrap();
    assert_eq!(plan.steps[1].depends_on, vec!["fetch"]);
    assert_eq!(plan.steps[1].step_type, StepType::Synthesis);
    assert_eq!(plan.estimated_total_duration, Some(25));

    let executor = PlanExecutor::new(
        Arc::new(RuleSafetyGate::new(RiskLevel::High, false)),
        Arc::new(AutoDenyBroker::default()),
        registry,
        reasoner.clone(),
    );
    let outcome = executor.execute(&mut plan).await;

    assert!(outcome.success());
    assert_eq!(outcome.status, PlanOutcome::Succeeded);
    assert_eq!(outcome.safety_checks, 2);
    assert!(outcome.tools_used.contains("file_read"));
    assert_eq!(outcome.tools_used.len(), 1);
    assert_eq!(
        outcome.step_results[0].output.as_ref().unwrap()["output"],
        "hello notes"
    );
    assert_eq!(reasoner.executed(), vec!["summarise"]);

    let progress = plan.get_progress();
    assert_eq!(progress.completed_steps, 2);
    assert!((progress.progress_percentage - 100.0).abs() < f64::EPSILON);
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert!(plan.completed_at.is_some());
}

#[tokio::test]
async fn unparseable_response_falls_back_to_numbered_lines() {
    let reasoner = Arc::new(StubReasoner::new(
        "I could not produce JSON {oops\n1. Gather the facts\n   from the archive\n2) Write the answer }",
    ));
    let planner = TaskPlanner::new(reasoner.clone(), &PlannerConfig::default());

    let mut plan = planner.create_plan(&Task::new("Answer a question")).await.unwrap();

    let descriptions: Vec<&str> = plan.steps.iter().map(|s| s.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec!["Gather the facts from the archive", "Write the answer }"]
    );
    assert_eq!(plan.description.as_deref(), Some("Generated execution plan"));
    assert_eq!(plan.estimated_total_duration, Some(120));

    let outcome = crate::stubs::permissive_executor(
        Arc::new(crate::stubs::RecordingTools::default()),
        reasoner.clone(),
    )
    .execute(&mut plan)
    .await;

    assert!(outcome.success());
    assert_eq!(reasoner.executed().len(), 2);
    assert!(outcome.tools_used.is_empty());
}

#[test]
fn parser_reports_its_source() {
    let parser = xing::planner::DecompositionParser::default();
    assert_eq!(parser.parse(READ_THEN_SUMMARISE).source, DraftSource::Json);
    assert_eq!(parser.parse("- just one thing").source, DraftSource::Heuristic);
}
