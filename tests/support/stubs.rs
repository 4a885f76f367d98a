#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use xing::planner::{PlanExecutor, PlanStep};
use xing::reasoner::Reasoner;
use xing::safety::{AllowAllGate, AutoDenyBroker, SafetyGate};
use xing::tools::{ToolExecutor, ToolResult};

/// Reasoner that answers planning prompts from a script and records which
/// steps it was asked to execute.
pub struct StubReasoner {
    classification: String,
    plan_response: String,
    step_failures: Mutex<HashMap<String, u32>>,
    executed: Mutex<Vec<String>>,
}

impl StubReasoner {
    pub fn new(plan_response: impl Into<String>) -> Self {
        Self {
            classification: "general".to_string(),
            plan_response: plan_response.into(),
            step_failures: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn classified_as(mut self, category: &str) -> Self {
        self.classification = category.to_string();
        self
    }

    /// Make `step_id` fail its first `times` executions.
    pub fn failing_step(self, step_id: &str, times: u32) -> Self {
        self.step_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(step_id.to_string(), times);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Reasoner for StubReasoner {
    async fn query(&self, prompt: &str) -> Result<String> {
        if prompt.starts_with("Classify") {
            return Ok(self.classification.clone());
        }
        if prompt.starts_with("Develop a strategic approach") {
            return Ok(self.plan_response.clone());
        }
        Ok("{}".to_string())
    }

    async fn execute_step(&self, step: &PlanStep) -> Result<Value> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(step.id.clone());

        let mut failures = self
            .step_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(remaining) = failures.get_mut(&step.id)
            && *remaining > 0
        {
            *remaining -= 1;
            bail!("transient: reasoning backend unavailable");
        }
        Ok(json!({"step_id": step.id, "result": "ok"}))
    }
}

/// Tool executor that succeeds unless the tool is listed as failing.
#[derive(Default)]
pub struct RecordingTools {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingTools {
    pub fn failing(tools: &[&str]) -> Self {
        Self {
            failing: tools.iter().map(|t| (*t).to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingTools {
    async fn execute(&self, name: &str, _parameters: &Map<String, Value>) -> Result<ToolResult> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
        if self.failing.contains(name) {
            return Ok(ToolResult::failure(format!("{name} is broken")));
        }
        Ok(ToolResult::ok(format!("{name} done")))
    }
}

pub fn executor(
    gate: Arc<dyn SafetyGate>,
    tools: Arc<dyn ToolExecutor>,
    reasoner: Arc<dyn Reasoner>,
) -> PlanExecutor {
    PlanExecutor::new(gate, Arc::new(AutoDenyBroker::default()), tools, reasoner)
}

pub fn permissive_executor(
    tools: Arc<dyn ToolExecutor>,
    reasoner: Arc<dyn Reasoner>,
) -> PlanExecutor {
    executor(Arc::new(AllowAllGate), tools, reasoner)
}

pub fn reasoning_step(id: &str, deps: &[&str]) -> PlanStep {
    PlanStep::new(format!("Think about {id}"), xing::StepType::Reasoning)
        .with_id(id)
        .with_dependencies(deps.iter().copied())
}

pub fn tool_step(id: &str, tool: &str, deps: &[&str]) -> PlanStep {
    PlanStep::tool_call(format!("Use {tool}"), tool, Map::new())
        .with_id(id)
        .with_dependencies(deps.iter().copied())
}
