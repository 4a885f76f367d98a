use crate::config::PlannerConfig;
use crate::error::PlanningError;
use crate::planner::parser::{DecompositionParser, PlanDraft, StepDraft};
use crate::planner::templates::{TaskCategory, planning_prompt};
use crate::planner::types::{ExecutionPlan, PlanStep, StepType};
use crate::planner::validator::{PlanValidator, ValidationReport};
use crate::reasoner::Reasoner;
use crate::task::Task;
use std::sync::Arc;

/// Turns a [`Task`] into a validated [`ExecutionPlan`] with the help of a
/// [`Reasoner`].
pub struct TaskPlanner {
    reasoner: Arc<dyn Reasoner>,
    parser: DecompositionParser,
    validator: PlanValidator,
    max_retries: u32,
}

impl TaskPlanner {
    pub fn new(reasoner: Arc<dyn Reasoner>, config: &PlannerConfig) -> Self {
        Self {
            reasoner,
            parser: DecompositionParser::new(config.default_step_duration_secs),
            validator: PlanValidator::new(config.dangling_policy),
            max_retries: config.default_max_retries,
        }
    }

    /// Let validation report tool steps that name nothing in `tools`.
    pub fn with_known_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validator = self.validator.with_known_tools(tools);
        self
    }

    pub async fn classify(&self, task: &Task) -> Result<TaskCategory, PlanningError> {
        let answer = self
            .reasoner
            .classify(task)
            .await
            .map_err(|cause| PlanningError::Reasoner {
                stage: "classification",
                cause,
            })?;
        let category = TaskCategory::from_answer(&answer);
        tracing::debug!(task_id = %task.id, category = %category, "task classified");
        Ok(category)
    }

    pub async fn create_plan(&self, task: &Task) -> Result<ExecutionPlan, PlanningError> {
        let category = self.classify(task).await?;
        let prompt = planning_prompt(category, task);
        let response = self
            .reasoner
            .reason_strategically(&prompt)
            .await
            .map_err(|cause| PlanningError::Reasoner {
                stage: "decomposition",
                cause,
            })?;

        let draft = self.parser.parse(&response);
        let (plan, _) = self.build_plan(task, draft)?;
        Ok(plan)
    }

    /// Materialise a parsed draft into a plan for `task` and validate it.
    pub fn build_plan(
        &self,
        task: &Task,
        draft: PlanDraft,
    ) -> Result<(ExecutionPlan, ValidationReport), PlanningError> {
        let mut plan = ExecutionPlan::new(task.id.clone()).with_description(
            draft
                .description
                .unwrap_or_else(|| format!("Execution plan for: {}", task.description)),
        );

        let mut step_total = 0u64;
        for step_draft in draft.steps {
            step_total = step_total.saturating_add(step_draft.estimated_duration);
            plan.add_step(self.step_from_draft(step_draft))?;
        }
        plan.estimated_total_duration = Some(draft.estimated_duration.unwrap_or(step_total));

        let report = self.validator.validate(&mut plan)?;
        tracing::info!(
            plan_id = %plan.id,
            task_id = %task.id,
            steps = plan.steps.len(),
            source = ?draft.source,
            "execution plan created"
        );
        Ok((plan, report))
    }

    fn step_from_draft(&self, draft: StepDraft) -> PlanStep {
        let mut step = match draft.tool_name {
            Some(tool) if draft.step_type == StepType::ToolCall => {
                PlanStep::tool_call(draft.description, tool, draft.parameters)
            }
            _ => {
                let mut step = PlanStep::new(draft.description, draft.step_type);
                step.parameters = draft.parameters;
                step
            }
        }
        .with_id(draft.id)
        .with_dependencies(draft.depends_on)
        .with_max_retries(self.max_retries)
        .with_estimated_duration(draft.estimated_duration);
        step.expected_output = draft.expected_output;
        step
    }

    /// Hook for reordering or merging steps before execution. Returns the
    /// plan unchanged.
    pub fn optimize(&self, plan: ExecutionPlan) -> ExecutionPlan {
        plan
    }
}
