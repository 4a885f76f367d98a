use std::sync::Arc;

use xing::config::PlannerConfig;
use xing::error::{PlanError, PlanningError};
use xing::planner::{DanglingPolicy, PlanOutcome, PlanValidator, TaskPlanner};
use xing::{ExecutionPlan, Task};

use crate::stubs::{RecordingTools, StubReasoner, permissive_executor, reasoning_step};

#[tokio::test]
async fn cyclic_decomposition_is_rejected_before_execution() {
    let reasoner = Arc::new(StubReasoner::new(
        r#"{"steps": [
            {"id": "a", "description": "A", "depends_on": ["c"]},
            {"id": "b", "description": "B", "depends_on": ["a"]},
            {"id": "c", "description": "C", "depends_on": ["step 2"]}
        ]}"#,
    ));
    let planner = TaskPlanner::new(reasoner.clone(), &PlannerConfig::default());

    let err = planner.create_plan(&Task::new("loop forever")).await.unwrap_err();

    match err {
        PlanningError::Invalid(PlanError::CircularDependency { path, .. }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.len() >= 4, "{path:?}");
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(reasoner.executed().is_empty());
}

#[tokio::test]
async fn dangling_dependency_is_repaired_and_plan_runs() {
    let reasoner = Arc::new(StubReasoner::new(
        r#"{"steps": [
            {"id": "a", "description": "A"},
            {"id": "b", "description": "B", "depends_on": ["a", "ghost"]}
        ]}"#,
    ));
    let planner = TaskPlanner::new(reasoner.clone(), &PlannerConfig::default());

    let mut plan = planner.create_plan(&Task::new("two steps")).await.unwrap();
    assert_eq!(plan.get_step("b").unwrap().depends_on, vec!["a"]);

    let outcome = permissive_executor(Arc::new(RecordingTools::default()), reasoner.clone())
        .execute(&mut plan)
        .await;

    assert_eq!(outcome.status, PlanOutcome::Succeeded);
    assert_eq!(reasoner.executed(), vec!["a", "b"]);
}

#[tokio::test]
async fn unvalidated_dangling_dependency_blocks_execution() {
    let reasoner = Arc::new(StubReasoner::new(""));
    let mut plan = ExecutionPlan::new("raw");
    plan.add_step(reasoning_step("a", &["ghost"])).unwrap();

    let outcome = permissive_executor(Arc::new(RecordingTools::default()), reasoner.clone())
        .execute(&mut plan)
        .await;

    assert_eq!(outcome.status, PlanOutcome::Blocked);
    assert_eq!(outcome.blocked[0].waiting_on, vec!["ghost"]);
    assert!(reasoner.executed().is_empty());
}

#[test]
fn loaded_plan_with_repeated_step_id_is_rejected() {
    let mut plan: ExecutionPlan = serde_json::from_str(
        r#"{"id": "loaded", "task_id": "t", "steps": [
            {"id": "A", "description": "first", "step_type": "reasoning"},
            {"id": "A", "description": "again", "step_type": "reasoning"},
            {"id": "B", "description": "after", "step_type": "reasoning", "depends_on": ["A"]}
        ]}"#,
    )
    .unwrap();

    let err = PlanValidator::default().validate(&mut plan).unwrap_err();

    assert!(matches!(
        err,
        PlanError::DuplicateStep { ref plan_id, ref step_id } if plan_id == "loaded" && step_id == "A"
    ));
}

#[test]
fn reject_policy_reports_first_dangling_edge() {
    let mut plan = ExecutionPlan::new("raw");
    plan.add_step(reasoning_step("a", &[])).unwrap();
    plan.add_step(reasoning_step("b", &["missing"])).unwrap();

    let err = PlanValidator::new(DanglingPolicy::Reject)
        .validate(&mut plan)
        .unwrap_err();

    assert!(matches!(
        err,
        PlanError::DanglingDependency { ref step_id, ref dependency, .. }
            if step_id == "b" && dependency == "missing"
    ));
    assert_eq!(plan.get_step("b").unwrap().depends_on, vec!["missing"]);
}

#[test]
fn empty_plan_validates_and_reports_zero_progress() {
    let mut plan = ExecutionPlan::new("empty");
    let report = PlanValidator::default().validate(&mut plan).unwrap();

    assert!(report.removed_dependencies.is_empty());
    assert!(report.required_tools.is_empty());
    let progress = plan.get_progress();
    assert_eq!(progress.total_steps, 0);
    assert!(progress.progress_percentage.abs() < f64::EPSILON);
    assert_eq!(plan.get_progress(), progress);
}
