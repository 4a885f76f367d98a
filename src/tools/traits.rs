use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Description of a tool for the planner prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What every tool invocation may rely on.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Relative tool paths resolve under this directory.
    pub workspace_dir: PathBuf,
}

impl ToolContext {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }
}

/// Core tool trait. Implement for any capability a plan step can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as it appears in a step's `tool_name`
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given arguments
    async fn execute(
        &self,
        args: &Map<String, Value>,
        ctx: &ToolContext,
    ) -> anyhow::Result<ToolResult>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The executor's view of tooling: dispatch by name.
///
/// An unknown name is a recoverable condition and should come back as a
/// failed [`ToolResult`]. `Err` is reserved for transport problems; the plan
/// executor treats both as a step failure.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, parameters: &Map<String, Value>)
    -> anyhow::Result<ToolResult>;

    /// Names the executor can dispatch, when it knows them up front.
    fn available_tools(&self) -> Option<Vec<String>> {
        None
    }
}
