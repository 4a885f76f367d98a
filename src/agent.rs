use crate::config::XingConfig;
use crate::knowledge::{JsonlKnowledgeStore, KnowledgeStore};
use crate::learning::{LearningExperience, LearningInsights, LearningSystem};
use crate::planner::{ExecutionOutcome, ExecutionPlan, PlanExecutor, PlanOutcome, TaskPlanner};
use crate::reasoner::{Reasoner, RequestUnderstanding};
use crate::safety::{ApprovalBroker, AutoDenyBroker, RuleSafetyGate, SafetyGate};
use crate::task::Task;
use crate::tools::{ToolExecutor, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex, PoisonError};
use strum::{AsRefStr, Display};
use tokio_util::sync::CancellationToken;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Thinking,
    Planning,
    Executing,
    Learning,
    Error,
}

/// Everything one [`Agent::process_request`] call produced.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub success: bool,
    pub task_id: Option<String>,
    pub plan: Option<ExecutionPlan>,
    pub outcome: Option<ExecutionOutcome>,
    pub experience: Option<LearningExperience>,
    pub error: Option<String>,
}

impl AgentResponse {
    fn failure(task_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            task_id,
            plan: None,
            outcome: None,
            experience: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub current_task: Option<String>,
    pub tasks_processed: usize,
    pub learning_enabled: bool,
    pub cancelled: bool,
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Collaborators not supplied explicitly are derived from the config: a
/// [`RuleSafetyGate`] at the configured level, an [`AutoDenyBroker`], the
/// built-in [`ToolRegistry`] over the workspace and a JSONL knowledge file.
pub struct AgentBuilder {
    config: XingConfig,
    reasoner: Arc<dyn Reasoner>,
    safety: Option<Arc<dyn SafetyGate>>,
    approvals: Option<Arc<dyn ApprovalBroker>>,
    tools: Option<Arc<dyn ToolExecutor>>,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
}

impl AgentBuilder {
    pub fn safety_gate(mut self, gate: Arc<dyn SafetyGate>) -> Self {
        self.safety = Some(gate);
        self
    }

    pub fn approval_broker(mut self, broker: Arc<dyn ApprovalBroker>) -> Self {
        self.approvals = Some(broker);
        self
    }

    pub fn tool_executor(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn knowledge_store(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge = Some(store);
        self
    }

    pub fn build(self) -> Agent {
        let config = self.config;
        let safety = self.safety.unwrap_or_else(|| {
            Arc::new(RuleSafetyGate::new(
                config.safety.level,
                config.safety.auto_approve_safe,
            ))
        });
        let approvals = self
            .approvals
            .unwrap_or_else(|| Arc::new(AutoDenyBroker::default()));
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(ToolRegistry::with_builtin_tools(&config.workspace_dir)));
        let knowledge = self
            .knowledge
            .unwrap_or_else(|| Arc::new(JsonlKnowledgeStore::new(config.knowledge_path())));

        let mut planner = TaskPlanner::new(self.reasoner.clone(), &config.planner);
        if let Some(known) = tools.available_tools() {
            planner = planner.with_known_tools(known);
        }

        let cancel = CancellationToken::new();
        let executor = PlanExecutor::new(safety, approvals, tools, self.reasoner.clone())
            .with_retry_failed_steps(config.executor.retry_failed_steps)
            .with_cancellation(cancel.clone());

        tracing::info!(
            safety_level = %config.safety.level,
            learning = config.learning.enabled,
            "agent initialized"
        );

        Agent {
            reasoner: self.reasoner,
            planner,
            executor,
            learning: LearningSystem::new(knowledge, config.learning.enabled),
            cancel,
            state: Mutex::new(AgentState::Idle),
            current_task: Mutex::new(None),
            history: Mutex::new(Vec::new()),
        }
    }
}

// ── Agent ────────────────────────────────────────────────────────────────────

/// Runs requests end to end: understand, plan, execute, learn.
pub struct Agent {
    reasoner: Arc<dyn Reasoner>,
    planner: TaskPlanner,
    executor: PlanExecutor,
    learning: LearningSystem,
    cancel: CancellationToken,
    state: Mutex<AgentState>,
    current_task: Mutex<Option<String>>,
    history: Mutex<Vec<Task>>,
}

impl Agent {
    pub fn builder(config: XingConfig, reasoner: Arc<dyn Reasoner>) -> AgentBuilder {
        AgentBuilder {
            config,
            reasoner,
            safety: None,
            approvals: None,
            tools: None,
            knowledge: None,
        }
    }

    /// Never fails: every error ends up in [`AgentResponse::error`].
    pub async fn process_request(
        &self,
        input: &str,
        context: Map<String, Value>,
    ) -> AgentResponse {
        if self.cancel.is_cancelled() {
            return AgentResponse::failure(None, "agent has been cancelled");
        }

        self.set_state(AgentState::Thinking);
        let mut task = self.parse_request(input, context).await;
        self.set_current_task(Some(task.id.clone()));
        if let Err(err) = task.start() {
            return self.abort(task, err.to_string());
        }

        self.set_state(AgentState::Planning);
        let mut plan = match self.planner.create_plan(&task).await {
            Ok(plan) => self.planner.optimize(plan),
            Err(err) => return self.abort(task, format!("planning failed: {err}")),
        };

        self.set_state(AgentState::Executing);
        let outcome = self.executor.execute(&mut plan).await;

        let transition = match outcome.status {
            PlanOutcome::Succeeded => task.complete(json!({
                "plan_id": plan.id,
                "completed_steps": outcome.completed_steps(),
                "tools_used": outcome.tools_used,
            })),
            PlanOutcome::Cancelled => task.cancel(),
            PlanOutcome::Partial | PlanOutcome::Blocked => {
                task.fail(outcome.failure_summary().unwrap_or_default())
            }
        };
        if let Err(err) = transition {
            tracing::warn!(task_id = %task.id, error = %err, "task transition rejected");
        }

        if self.learning.is_enabled() {
            self.set_state(AgentState::Learning);
        }
        let experience = self
            .learning
            .learn_from_execution(&task, &plan, &outcome)
            .await;

        let task_id = task.id.clone();
        self.archive(task);
        self.set_state(AgentState::Idle);

        AgentResponse {
            success: outcome.success(),
            task_id: Some(task_id),
            error: outcome.failure_summary(),
            plan: Some(plan),
            outcome: Some(outcome),
            experience,
        }
    }

    async fn parse_request(&self, input: &str, context: Map<String, Value>) -> Task {
        let understanding = match self.reasoner.understand_request(input, &context).await {
            Ok(understanding) => understanding,
            Err(err) => {
                tracing::warn!(error = %err, "request understanding failed, using defaults");
                RequestUnderstanding::fallback(input)
            }
        };
        tracing::debug!(objective = %understanding.objective, "request understood");

        Task::new(input)
            .with_requirements(understanding.requirements)
            .with_constraints(understanding.constraints)
            .with_context(context)
            .with_priority(understanding.priority)
    }

    fn abort(&self, mut task: Task, error: String) -> AgentResponse {
        tracing::error!(task_id = %task.id, error = %error, "request failed");
        if let Err(err) = task.fail(error.clone()) {
            tracing::warn!(task_id = %task.id, error = %err, "task transition rejected");
        }
        let task_id = task.id.clone();
        self.archive(task);
        self.set_state(AgentState::Error);
        AgentResponse::failure(Some(task_id), error)
    }

    fn archive(&self, task: Task) {
        self.set_current_task(None);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    fn set_state(&self, state: AgentState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn set_current_task(&self, task_id: Option<String>) {
        *self
            .current_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = task_id;
    }

    /// Stop the running plan before its next step and refuse further requests.
    pub fn cancel(&self) {
        tracing::info!("agent cancellation requested");
        self.cancel.cancel();
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            state: *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            current_task: self
                .current_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            tasks_processed: self
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            learning_enabled: self.learning.is_enabled(),
            cancelled: self.cancel.is_cancelled(),
        }
    }

    /// Finished tasks, oldest first.
    pub fn history(&self) -> Vec<Task> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn insights(&self, filter: Option<&str>) -> LearningInsights {
        self.learning.insights(filter)
    }
}
