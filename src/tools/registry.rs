use super::file_read::FileReadTool;
use super::file_write::FileWriteTool;
use super::traits::{Tool, ToolContext, ToolExecutor, ToolResult, ToolSpec};
use crate::error::ToolError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Explicit registry of tool instances, owned by whoever builds the executor.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRegistry {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools: HashMap::new(),
            ctx: ToolContext::new(workspace_dir),
        }
    }

    /// Registry with the built-in workspace file tools.
    pub fn with_builtin_tools(workspace_dir: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new(workspace_dir);
        registry.register(Box::new(FileReadTool::new()));
        registry.register(Box::new(FileWriteTool::new()));
        registry
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let tool: Arc<dyn Tool> = Arc::from(tool);
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn workspace_dir(&self) -> &std::path::Path {
        &self.ctx.workspace_dir
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> anyhow::Result<ToolResult> {
        let Some(tool) = self.tools.get(name) else {
            let err = ToolError::NotFound {
                name: name.to_string(),
            };
            tracing::warn!(tool = %name, "{err}");
            return Ok(ToolResult::failure(err.to_string()));
        };

        tracing::debug!(tool = %name, "executing tool");
        tool.execute(parameters, &self.ctx).await
    }

    fn available_tools(&self) -> Option<Vec<String>> {
        Some(self.tool_names().into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echo the text parameter"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            args: &Map<String, Value>,
            _ctx: &ToolContext,
        ) -> anyhow::Result<ToolResult> {
            Ok(ToolResult::ok(
                args.get("text").and_then(Value::as_str).unwrap_or_default(),
            ))
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_soft_failure() {
        let registry = ToolRegistry::new(".");
        let result = registry.execute("teleport", &Map::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("tool teleport not found"));
    }

    #[tokio::test]
    async fn dispatches_registered_tool() {
        let mut registry = ToolRegistry::new(".");
        registry.register(Box::new(EchoTool));

        let mut args = Map::new();
        args.insert("text".into(), json!("hi"));
        let result = registry.execute("echo", &args).await.unwrap();

        assert_eq!(result, ToolResult::ok("hi"));
    }

    #[test]
    fn builtin_tools_are_registered_sorted() {
        let registry = ToolRegistry::with_builtin_tools(".");
        assert_eq!(registry.tool_names(), vec!["file_read", "file_write"]);
        assert_eq!(
            registry.available_tools(),
            Some(vec!["file_read".to_string(), "file_write".to_string()])
        );
        assert_eq!(registry.specs()[1].name, "file_write");
    }

    #[test]
    fn unregister_reports_presence() {
        let mut registry = ToolRegistry::with_builtin_tools(".");
        assert!(registry.unregister("file_read"));
        assert!(!registry.unregister("file_read"));
        assert!(registry.get("file_read").is_none());
    }
}
