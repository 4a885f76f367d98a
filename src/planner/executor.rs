use crate::error::StepError;
use crate::planner::types::{ExecutionPlan, PlanProgress, PlanStep, StepStatus};
use crate::reasoner::Reasoner;
use crate::safety::{ApprovalBroker, ApprovalDecision, ApprovalRequest, SafetyGate, SafetyResult};
use crate::tools::ToolExecutor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;
use strum::{AsRefStr, Display};
use tokio_util::sync::CancellationToken;

/// Why the executor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanOutcome {
    /// Every step completed.
    Succeeded,
    /// Nothing left to run, but some steps failed or were skipped.
    Partial,
    /// Steps remain pending and none of them can ever become runnable.
    Blocked,
    /// Stopped by the cancellation token before the plan ran out of work.
    Cancelled,
}

/// One dispatch of one step. A retried step yields one entry per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub attempt: u32,
    pub success: bool,
    pub tool_name: Option<String>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub step_id: String,
    pub reason: String,
}

/// A pending step left behind by a blocked run, with the dependencies that
/// never completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedStep {
    pub step_id: String,
    pub waiting_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub plan_id: String,
    pub status: PlanOutcome,
    pub step_results: Vec<StepResult>,
    pub tools_used: BTreeSet<String>,
    pub safety_checks: usize,
    pub skipped: Vec<SkippedStep>,
    /// Empty unless `status` is [`PlanOutcome::Blocked`].
    #[serde(default)]
    pub blocked: Vec<BlockedStep>,
    pub progress: PlanProgress,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.status == PlanOutcome::Succeeded
    }

    pub fn completed_steps(&self) -> usize {
        self.progress.completed_steps
    }

    /// Human-readable reason for a non-successful run.
    pub fn failure_summary(&self) -> Option<String> {
        match self.status {
            PlanOutcome::Succeeded => None,
            PlanOutcome::Cancelled => Some("execution cancelled".to_string()),
            PlanOutcome::Blocked => {
                let mut summary = format!(
                    "plan blocked with {} of {} steps completed",
                    self.progress.completed_steps, self.progress.total_steps
                );
                for blocked in &self.blocked {
                    let _ = write!(
                        summary,
                        "; {} waits on {}",
                        blocked.step_id,
                        blocked.waiting_on.join(", ")
                    );
                }
                Some(summary)
            }
            PlanOutcome::Partial => Some(format!(
                "{} failed and {} skipped of {} steps",
                self.progress.failed_steps, self.progress.skipped_steps, self.progress.total_steps
            )),
        }
    }
}

#[derive(Default)]
struct RunState {
    step_results: Vec<StepResult>,
    tools_used: BTreeSet<String>,
    safety_checks: usize,
    skipped: Vec<SkippedStep>,
}

/// Drives an [`ExecutionPlan`] to completion, one step at a time.
///
/// Collaborator failures are recorded on the affected step and never escape
/// [`PlanExecutor::execute`].
pub struct PlanExecutor {
    safety: Arc<dyn SafetyGate>,
    approvals: Arc<dyn ApprovalBroker>,
    tools: Arc<dyn ToolExecutor>,
    reasoner: Arc<dyn Reasoner>,
    retry_failed_steps: bool,
    cancel: CancellationToken,
}

impl PlanExecutor {
    pub fn new(
        safety: Arc<dyn SafetyGate>,
        approvals: Arc<dyn ApprovalBroker>,
        tools: Arc<dyn ToolExecutor>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        Self {
            safety,
            approvals,
            tools,
            reasoner,
            retry_failed_steps: true,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_failed_steps(mut self, retry: bool) -> Self {
        self.retry_failed_steps = retry;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn execute(&self, plan: &mut ExecutionPlan) -> ExecutionOutcome {
        let started = Utc::now();
        plan.started_at = Some(started);
        plan.completed_at = None;
        tracing::info!(plan_id = %plan.id, steps = plan.steps.len(), "executing plan");

        let mut run = RunState::default();
        let status = loop {
            if self.cancel.is_cancelled() {
                tracing::info!(plan_id = %plan.id, "execution cancelled");
                break PlanOutcome::Cancelled;
            }

            let Some(index) = plan.next_step_index() else {
                break Self::exhausted_outcome(plan);
            };

            plan.current_step = Some(plan.steps[index].id.clone());
            // Steps are addressed by position and `run_step` only moves a
            // pending step forward, so a transition error here is a bug in
            // this loop rather than a property of the plan.
            if let Err(err) = self.run_step(&mut plan.steps[index], &mut run).await {
                tracing::error!(plan_id = %plan.id, error = %err, "step state machine violated");
                break PlanOutcome::Blocked;
            }
            Self::log_stranded_dependents(plan, index);
        };

        let blocked = if status == PlanOutcome::Blocked {
            Self::blocked_steps(plan)
        } else {
            Vec::new()
        };

        let finished = Utc::now();
        plan.completed_at = Some(finished);
        plan.actual_total_duration = u64::try_from((finished - started).num_seconds()).ok();

        let progress = plan.get_progress();
        tracing::info!(
            plan_id = %plan.id,
            outcome = %status,
            completed = progress.completed_steps,
            failed = progress.failed_steps,
            skipped = progress.skipped_steps,
            total = progress.total_steps,
            "plan execution finished"
        );

        ExecutionOutcome {
            plan_id: plan.id.clone(),
            status,
            step_results: run.step_results,
            tools_used: run.tools_used,
            safety_checks: run.safety_checks,
            skipped: run.skipped,
            blocked,
            progress,
        }
    }

    fn log_stranded_dependents(plan: &ExecutionPlan, index: usize) {
        let step = &plan.steps[index];
        if !matches!(step.status, StepStatus::Failed | StepStatus::Skipped) {
            return;
        }
        let graph = plan.dependency_graph();
        let dependents = graph.dependents_of(&step.id);
        if !dependents.is_empty() {
            tracing::warn!(
                plan_id = %plan.id,
                step_id = %step.id,
                dependents = %dependents.join(", "),
                "dependent steps can no longer run"
            );
        }
    }

    fn blocked_steps(plan: &ExecutionPlan) -> Vec<BlockedStep> {
        let graph = plan.dependency_graph();
        plan.steps
            .iter()
            .filter(|step| step.status == StepStatus::Pending)
            .map(|step| {
                let unfinished = graph.dependencies_of(&step.id).into_iter().filter(|dep| {
                    plan.get_step(dep)
                        .is_none_or(|dep_step| dep_step.status != StepStatus::Completed)
                });
                let unknown = graph
                    .dangling()
                    .filter(|(step_id, _)| *step_id == step.id)
                    .map(|(_, dep)| dep);
                BlockedStep {
                    step_id: step.id.clone(),
                    waiting_on: unfinished.chain(unknown).map(str::to_string).collect(),
                }
            })
            .collect()
    }

    fn exhausted_outcome(plan: &ExecutionPlan) -> PlanOutcome {
        if plan.has_unfinished_steps() {
            tracing::warn!(
                plan_id = %plan.id,
                pending = plan.count_status(StepStatus::Pending),
                "no runnable step left, plan is blocked"
            );
            PlanOutcome::Blocked
        } else if plan
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Completed)
        {
            PlanOutcome::Succeeded
        } else {
            PlanOutcome::Partial
        }
    }

    async fn run_step(&self, step: &mut PlanStep, run: &mut RunState) -> Result<(), StepError> {
        let verdict = match self.safety.check(step).await {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(step_id = %step.id, error = %err, "safety gate failed, denying");
                SafetyResult::fail_safe(&err)
            }
        };
        run.safety_checks += 1;

        if !verdict.approved {
            let denial = if verdict.requires_human_approval {
                self.request_approval(step, &verdict).await.err()
            } else {
                Some(verdict.reason.clone())
            };
            if let Some(reason) = denial {
                tracing::warn!(step_id = %step.id, reason = %reason, "step skipped by safety gate");
                step.skip()?;
                run.skipped.push(SkippedStep {
                    step_id: step.id.clone(),
                    reason,
                });
                return Ok(());
            }
        }

        step.start()?;
        let attempt = step.retry_count + 1;
        tracing::debug!(
            step_id = %step.id,
            attempt,
            tool = step.tool_name.as_deref().unwrap_or("-"),
            "dispatching step"
        );

        match self.dispatch(step).await {
            Ok(output) => {
                step.complete(output.clone())?;
                if let Some(tool) = &step.tool_name {
                    run.tools_used.insert(tool.clone());
                }
                run.step_results.push(StepResult {
                    step_id: step.id.clone(),
                    attempt,
                    success: true,
                    tool_name: step.tool_name.clone(),
                    output: Some(output),
                    error: None,
                });
            }
            Err(error) => {
                step.fail(error.clone())?;
                run.step_results.push(StepResult {
                    step_id: step.id.clone(),
                    attempt,
                    success: false,
                    tool_name: step.tool_name.clone(),
                    output: None,
                    error: Some(error.clone()),
                });

                if self.retry_failed_steps && step.can_retry() {
                    tracing::info!(
                        step_id = %step.id,
                        retry_count = step.retry_count,
                        max_retries = step.max_retries,
                        error = %error,
                        "step failed, will retry"
                    );
                    step.reset_for_retry()?;
                } else {
                    tracing::warn!(step_id = %step.id, error = %error, "step failed");
                }
            }
        }

        Ok(())
    }

    /// `Err` carries the text recorded on the failed step.
    async fn dispatch(&self, step: &PlanStep) -> Result<Value, String> {
        let Some(tool) = step.tool_name.as_deref() else {
            return self
                .reasoner
                .execute_step(step)
                .await
                .map_err(|err| format!("{err:#}"));
        };

        match self.tools.execute(tool, &step.parameters).await {
            Ok(result) if result.success => Ok(json!({
                "tool": tool,
                "output": result.output,
            })),
            Ok(result) => Err(result
                .error
                .unwrap_or_else(|| format!("tool {tool} reported failure"))),
            Err(err) => Err(format!("{err:#}")),
        }
    }

    /// `Err` carries the reason the step stays denied.
    async fn request_approval(&self, step: &PlanStep, verdict: &SafetyResult) -> Result<(), String> {
        let request = ApprovalRequest::for_step(step, verdict);
        match self.approvals.request_approval(&request).await {
            Ok(ApprovalDecision::Approved) => {
                tracing::info!(step_id = %step.id, "step approved by human");
                Ok(())
            }
            Ok(ApprovalDecision::Denied { reason }) => {
                Err(format!("{}; approval denied: {reason}", verdict.reason))
            }
            Err(err) => {
                tracing::warn!(step_id = %step.id, error = %err, "approval channel failed");
                Err(format!("{}; approval unavailable: {err:#}", verdict.reason))
            }
        }
    }
}
