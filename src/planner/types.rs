use crate::error::{PlanError, StepError};
use crate::planner::graph::DependencyGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_STEP_DURATION_SECS: u64 = 60;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StepType {
    Reasoning,
    ToolCall,
    Decision,
    Validation,
    Synthesis,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// One unit of work in a decomposed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    #[serde(default)]
    pub step_number: usize,
    pub description: String,
    pub step_type: StepType,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "pending")]
    pub status: StepStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<u64>,
    #[serde(default)]
    pub actual_duration: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn pending() -> StepStatus {
    StepStatus::Pending
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl PlanStep {
    /// A step that is not a tool call. `tool_name` stays unset.
    pub fn new(description: impl Into<String>, step_type: StepType) -> Self {
        let step_type = if step_type == StepType::ToolCall {
            StepType::Reasoning
        } else {
            step_type
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            step_number: 0,
            description: description.into(),
            step_type,
            tool_name: None,
            parameters: Map::new(),
            expected_output: None,
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            estimated_duration: Some(DEFAULT_STEP_DURATION_SECS),
            actual_duration: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn tool_call(
        description: impl Into<String>,
        tool_name: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            step_type: StepType::ToolCall,
            tool_name: Some(tool_name.into()),
            parameters,
            ..Self::new(description, StepType::Reasoning)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.depends_on.contains(&id) {
                self.depends_on.push(id);
            }
        }
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_estimated_duration(mut self, secs: u64) -> Self {
        self.estimated_duration = Some(secs);
        self
    }

    pub fn start(&mut self) -> Result<(), StepError> {
        match self.status {
            StepStatus::Pending | StepStatus::Failed => {
                self.status = StepStatus::InProgress;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(self.invalid("start")),
        }
    }

    pub fn complete(&mut self, result: Value) -> Result<(), StepError> {
        if self.status != StepStatus::InProgress {
            return Err(self.invalid("complete"));
        }
        let now = Utc::now();
        self.status = StepStatus::Completed;
        self.completed_at = Some(now);
        self.result = Some(result);
        if let Some(started) = self.started_at {
            let elapsed = (now - started).num_seconds().max(0);
            self.actual_duration = u64::try_from(elapsed).ok();
        }
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), StepError> {
        if self.status != StepStatus::InProgress {
            return Err(self.invalid("fail"));
        }
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.retry_count += 1;
        Ok(())
    }

    pub fn skip(&mut self) -> Result<(), StepError> {
        if self.status != StepStatus::Pending {
            return Err(self.invalid("skip"));
        }
        self.status = StepStatus::Skipped;
        Ok(())
    }

    /// Put a failed step back in the queue. Only allowed while the retry
    /// budget is not exhausted.
    pub fn reset_for_retry(&mut self) -> Result<(), StepError> {
        if self.status != StepStatus::Failed || !self.can_retry() {
            return Err(self.invalid("retry"));
        }
        self.status = StepStatus::Pending;
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Skipped)
    }

    fn invalid(&self, action: &'static str) -> StepError {
        StepError::InvalidTransition {
            step_id: self.id.clone(),
            action,
            status: self.status.to_string(),
        }
    }
}

/// Counts reported by [`ExecutionPlan::get_progress`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub progress_percentage: f64,
    pub current_step: Option<String>,
}

/// The full set of steps plus their dependency graph for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub task_id: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub estimated_total_duration: Option<u64>,
    #[serde(default)]
    pub actual_total_duration: Option<u64>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionPlan {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            steps: Vec::new(),
            description: None,
            created_at: Utc::now(),
            estimated_total_duration: None,
            actual_total_duration: None,
            current_step: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_step(&mut self, mut step: PlanStep) -> Result<(), PlanError> {
        if self.step_index(&step.id).is_some() {
            return Err(PlanError::DuplicateStep {
                plan_id: self.id.clone(),
                step_id: step.id,
            });
        }
        step.step_number = self.steps.len() + 1;
        self.steps.push(step);
        Ok(())
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    pub fn get_step(&self, step_id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn get_step_mut(&mut self, step_id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|step| step.id == step_id)
    }

    /// First pending step, in list order, whose dependencies are all completed.
    pub fn get_next_step(&self) -> Option<&PlanStep> {
        self.next_step_index().map(|index| &self.steps[index])
    }

    /// Position of [`ExecutionPlan::get_next_step`] in `steps`.
    pub fn next_step_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::Pending && self.dependencies_satisfied(step))
    }

    pub fn next_step_id(&self) -> Option<String> {
        self.get_next_step().map(|step| step.id.clone())
    }

    fn dependencies_satisfied(&self, step: &PlanStep) -> bool {
        step.depends_on.iter().all(|dep| {
            self.get_step(dep)
                .is_some_and(|dep_step| dep_step.status == StepStatus::Completed)
        })
    }

    /// Whether any step is still pending or running.
    pub fn has_unfinished_steps(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step.status, StepStatus::Pending | StepStatus::InProgress))
    }

    pub fn count_status(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn get_progress(&self) -> PlanProgress {
        let total_steps = self.steps.len();
        let completed_steps = self.count_status(StepStatus::Completed);
        let progress_percentage = if total_steps == 0 {
            0.0
        } else {
            completed_steps as f64 / total_steps as f64 * 100.0
        };

        PlanProgress {
            total_steps,
            completed_steps,
            failed_steps: self.count_status(StepStatus::Failed),
            skipped_steps: self.count_status(StepStatus::Skipped),
            progress_percentage,
            current_step: self.current_step.clone(),
        }
    }

    /// Distinct tool names referenced by tool-call steps, sorted.
    pub fn required_tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = self
            .steps
            .iter()
            .filter_map(|step| step.tool_name.clone())
            .collect();
        tools.sort_unstable();
        tools.dedup();
        tools
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_plan(self)
    }
}
