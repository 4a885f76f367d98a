use std::sync::Arc;

use xing::ExecutionPlan;
use xing::planner::{PlanOutcome, StepStatus};
use xing::reasoner::Reasoner;
use xing::tools::ToolExecutor;

use crate::stubs::{RecordingTools, StubReasoner, permissive_executor, reasoning_step, tool_step};

fn plan(steps: Vec<xing::PlanStep>) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new("task-retry");
    for step in steps {
        plan.add_step(step).unwrap();
    }
    plan
}

#[tokio::test]
async fn step_is_never_dispatched_past_its_retry_budget() {
    let reasoner = Arc::new(StubReasoner::new("").failing_step("flaky", 10));
    let mut plan = plan(vec![reasoning_step("flaky", &[]).with_max_retries(2)]);

    let outcome = permissive_executor(Arc::new(RecordingTools::default()), reasoner.clone())
        .execute(&mut plan)
        .await;

    assert_eq!(reasoner.executed(), vec!["flaky", "flaky"]);
    let step = plan.get_step("flaky").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.retry_count, 2);
    assert!(step.retry_count <= step.max_retries);
    assert_eq!(
        step.error.as_deref(),
        Some("transient: reasoning backend unavailable")
    );
    assert_eq!(outcome.status, PlanOutcome::Partial);
    assert!(!outcome.success());
    assert_eq!(outcome.step_results.len(), 2);
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let reasoner = Arc::new(StubReasoner::new("").failing_step("a", 2));
    let mut plan = plan(vec![reasoning_step("a", &[]), reasoning_step("b", &["a"])]);

    let outcome = permissive_executor(Arc::new(RecordingTools::default()), reasoner.clone())
        .execute(&mut plan)
        .await;

    assert!(outcome.success());
    assert_eq!(reasoner.executed(), vec!["a", "a", "a", "b"]);
    assert_eq!(plan.get_step("a").unwrap().retry_count, 2);
}

#[tokio::test]
async fn failed_tool_blocks_its_dependents_but_not_independent_steps() {
    let tools = Arc::new(RecordingTools::failing(&["web_fetch"]));
    let reasoner = Arc::new(StubReasoner::new(""));
    let mut plan = plan(vec![
        tool_step("fetch", "web_fetch", &[]).with_max_retries(1),
        reasoning_step("analyse", &["fetch"]),
        reasoning_step("unrelated", &[]),
    ]);

    let outcome = permissive_executor(
        tools.clone() as Arc<dyn ToolExecutor>,
        reasoner.clone() as Arc<dyn Reasoner>,
    )
    .execute(&mut plan)
    .await;

    assert_eq!(outcome.status, PlanOutcome::Blocked);
    assert_eq!(tools.calls(), vec!["web_fetch"]);
    assert_eq!(reasoner.executed(), vec!["unrelated"]);
    assert_eq!(plan.get_step("analyse").unwrap().status, StepStatus::Pending);
    assert_eq!(
        plan.get_step("fetch").unwrap().error.as_deref(),
        Some("web_fetch is broken")
    );
    assert!(outcome.tools_used.is_empty());
    assert_eq!(
        outcome.failure_summary().as_deref(),
        Some("plan blocked with 1 of 3 steps completed; analyse waits on fetch")
    );
    assert_eq!(outcome.blocked.len(), 1);
    assert_eq!(outcome.blocked[0].waiting_on, vec!["fetch"]);
}

#[tokio::test]
async fn cancelled_token_stops_before_first_dispatch() {
    let reasoner = Arc::new(StubReasoner::new(""));
    let mut plan = plan(vec![reasoning_step("a", &[])]);
    let executor = permissive_executor(Arc::new(RecordingTools::default()), reasoner.clone());
    executor.cancellation_token().cancel();

    let outcome = executor.execute(&mut plan).await;

    assert_eq!(outcome.status, PlanOutcome::Cancelled);
    assert!(reasoner.executed().is_empty());
    assert_eq!(outcome.safety_checks, 0);
    assert_eq!(plan.get_step("a").unwrap().status, StepStatus::Pending);
}
