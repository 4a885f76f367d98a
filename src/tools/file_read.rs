use super::common::{required_str, workspace_path, workspace_path_property};
use super::traits::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

const MAX_READ_BYTES: u64 = 1024 * 1024;

/// Read a UTF-8 file from the workspace.
pub struct FileReadTool;

impl FileReadTool {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": workspace_path_property()
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        ctx: &ToolContext,
    ) -> anyhow::Result<ToolResult> {
        let path = required_str(self.name(), args, "path")?;

        let Some(full_path) = workspace_path(ctx, path) else {
            return Ok(ToolResult::failure(format!(
                "path not allowed outside the workspace: {path}"
            )));
        };

        let meta = match tokio::fs::metadata(&full_path).await {
            Ok(meta) => meta,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to read file: {e}"))),
        };
        if !meta.is_file() {
            return Ok(ToolResult::failure(format!("Not a file: {path}")));
        }
        if meta.len() > MAX_READ_BYTES {
            return Ok(ToolResult::failure(format!(
                "File too large: {} bytes (limit {MAX_READ_BYTES})",
                meta.len()
            )));
        }

        match tokio::fs::read_to_string(&full_path).await {
            Ok(contents) => Ok(ToolResult::ok(contents)),
            Err(e) => Ok(ToolResult::failure(format!("Failed to read file: {e}"))),
        }
    }
}
