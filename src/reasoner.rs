use crate::planner::{DecompositionParser, PlanStep};
use crate::planner::templates::classification_prompt;
use crate::task::{Task, TaskPriority};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::fmt::Write;

/// Language-model backed collaborator used for planning and for steps that
/// do not name a tool.
///
/// Only [`Reasoner::query`] is required. The provided methods build their
/// prompt and delegate to it, so a backend that just forwards text to a model
/// gets every capability for free; tests override individual methods.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn query(&self, prompt: &str) -> anyhow::Result<String>;

    /// Raw category answer for a task. Interpretation is the caller's job.
    async fn classify(&self, task: &Task) -> anyhow::Result<String> {
        self.query(&classification_prompt(task)).await
    }

    async fn reason_strategically(&self, problem: &str) -> anyhow::Result<String> {
        self.query(&strategic_prompt(problem)).await
    }

    async fn execute_step(&self, step: &PlanStep) -> anyhow::Result<Value> {
        let answer = self.query(&step_prompt(step)).await?;
        Ok(json!({
            "step_id": step.id,
            "result": answer,
            "type": "reasoning",
        }))
    }

    async fn understand_request(
        &self,
        input: &str,
        context: &Map<String, Value>,
    ) -> anyhow::Result<RequestUnderstanding> {
        let answer = self.query(&understanding_prompt(input, context)).await?;
        Ok(RequestUnderstanding::parse(input, &answer))
    }
}

/// Structured reading of a free-form user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUnderstanding {
    pub objective: String,
    pub requirements: Vec<String>,
    pub constraints: Vec<String>,
    pub priority: TaskPriority,
}

#[derive(Deserialize)]
struct RawUnderstanding {
    #[serde(default, alias = "goal", alias = "main_objective")]
    objective: Option<Value>,
    #[serde(default)]
    requirements: Value,
    #[serde(default)]
    constraints: Value,
    #[serde(default)]
    priority: Option<String>,
}

impl RequestUnderstanding {
    /// Used when the model's answer cannot be read.
    pub fn fallback(input: &str) -> Self {
        Self {
            objective: input.to_string(),
            requirements: Vec::new(),
            constraints: Vec::new(),
            priority: TaskPriority::default(),
        }
    }

    pub fn parse(input: &str, answer: &str) -> Self {
        let Some(raw) = DecompositionParser::extract_json(answer)
            .and_then(|json| serde_json::from_str::<RawUnderstanding>(json).ok())
        else {
            tracing::debug!("request understanding was not JSON, using defaults");
            return Self::fallback(input);
        };

        Self {
            objective: raw
                .objective
                .as_ref()
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|objective| !objective.is_empty())
                .map_or_else(|| input.to_string(), str::to_string),
            requirements: string_list(&raw.requirements),
            constraints: string_list(&raw.constraints),
            priority: raw
                .priority
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or_default(),
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(item) if !item.trim().is_empty() => vec![item.trim().to_string()],
        _ => Vec::new(),
    }
}

pub fn strategic_prompt(problem: &str) -> String {
    format!(
        "Develop a strategic approach:\n\
         1. Define clear objectives\n\
         2. Analyze current situation\n\
         3. Identify opportunities and threats\n\
         4. Consider resource requirements\n\
         5. Plan implementation steps\n\n\
         Goal: {problem}\n\n\
         Think through this step by step, showing your reasoning process."
    )
}

pub fn step_prompt(step: &PlanStep) -> String {
    let parameters = serde_json::to_string(&step.parameters).unwrap_or_else(|_| "{}".into());
    let mut prompt = format!(
        "Execute this reasoning step:\n\n\
         Step: {}\n\
         Parameters: {parameters}\n",
        step.description
    );
    if let Some(expected) = &step.expected_output {
        let _ = writeln!(prompt, "Expected output: {expected}");
    }
    prompt.push_str("\nProvide the result of this reasoning step.");
    prompt
}

pub fn understanding_prompt(input: &str, context: &Map<String, Value>) -> String {
    let context = serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".into());
    format!(
        "Analyze this user request and extract key information:\n\n\
         Request: \"{input}\"\n\
         Context: {context}\n\n\
         Respond in JSON format with these fields:\n\
         - objective: main goal\n\
         - requirements: list of required capabilities or tools\n\
         - constraints: list of constraints and limitations\n\
         - priority: one of low, medium, high, urgent"
    )
}
