use crate::planner::PlanStep;
use crate::safety::gate::{RiskLevel, SafetyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub step_id: String,
    pub description: String,
    pub tool_name: Option<String>,
    pub args_summary: String,
    pub risk_level: RiskLevel,
    /// Why the safety gate refused the step on its own.
    pub reason: String,
}

impl ApprovalRequest {
    pub fn for_step(step: &PlanStep, verdict: &SafetyResult) -> Self {
        Self {
            step_id: step.id.clone(),
            description: step.description.clone(),
            tool_name: step.tool_name.clone(),
            args_summary: step
                .tool_name
                .as_deref()
                .map(|tool| summarize_args(tool, &step.parameters))
                .unwrap_or_default(),
            risk_level: verdict.risk_level,
            reason: verdict.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: String },
}

/// Human sign-off channel consulted when the safety gate escalates a step.
#[async_trait]
pub trait ApprovalBroker: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest)
    -> anyhow::Result<ApprovalDecision>;
}

pub struct AutoDenyBroker {
    pub reason: String,
}

impl Default for AutoDenyBroker {
    fn default() -> Self {
        Self {
            reason: "no approval channel configured".to_string(),
        }
    }
}

#[async_trait]
impl ApprovalBroker for AutoDenyBroker {
    async fn request_approval(
        &self,
        _request: &ApprovalRequest,
    ) -> anyhow::Result<ApprovalDecision> {
        Ok(ApprovalDecision::Denied {
            reason: self.reason.clone(),
        })
    }
}

#[must_use]
pub fn summarize_args(tool_name: &str, args: &Map<String, Value>) -> String {
    match tool_name {
        "file_write" => {
            let path = args.get("path").and_then(Value::as_str).unwrap_or("?");
            let len = args
                .get("content")
                .and_then(Value::as_str)
                .map_or(0, str::len);
            format!("write {len} bytes to {path}")
        }
        "file_read" => args
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string(),
        "python_exec" => args
            .get("code")
            .and_then(Value::as_str)
            .map(|code| code.lines().next().unwrap_or_default().to_string())
            .unwrap_or_else(|| "(no code)".to_string()),
        _ => serde_json::to_string(args).unwrap_or_default(),
    }
}
