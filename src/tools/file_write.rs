use super::common::{required_str, workspace_path, workspace_path_property};
use super::traits::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

/// Write file contents inside the workspace.
pub struct FileWriteTool;

impl FileWriteTool {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write contents to a file in the workspace"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": workspace_path_property(),
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        ctx: &ToolContext,
    ) -> anyhow::Result<ToolResult> {
        let path = required_str(self.name(), args, "path")?;
        let content = required_str(self.name(), args, "content")?;

        let Some(full_path) = workspace_path(ctx, path) else {
            return Ok(ToolResult::failure(format!(
                "path not allowed outside the workspace: {path}"
            )));
        };

        let Some(parent) = full_path.parent() else {
            return Ok(ToolResult::failure("Invalid path: missing parent directory"));
        };

        match tokio::fs::metadata(parent).await {
            Ok(meta) if !meta.is_dir() => {
                return Ok(ToolResult::failure(format!(
                    "Invalid path: parent is not a directory: {}",
                    parent.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(parent).await?;
            }
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Failed to inspect parent directory: {e}"
                )));
            }
        }

        // Resolve after creation so a symlinked parent cannot escape.
        let resolved_parent = match tokio::fs::canonicalize(parent).await {
            Ok(p) => p,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Failed to resolve file path: {e}"
                )));
            }
        };
        let workspace = tokio::fs::canonicalize(&ctx.workspace_dir)
            .await
            .unwrap_or_else(|_| ctx.workspace_dir.clone());
        if !resolved_parent.starts_with(&workspace) {
            return Ok(ToolResult::failure(
                "resolved path escapes the workspace",
            ));
        }

        let Some(file_name) = full_path.file_name() else {
            return Ok(ToolResult::failure("Invalid path: missing file name"));
        };
        let target = resolved_parent.join(file_name);

        if let Ok(meta) = tokio::fs::symlink_metadata(&target).await
            && meta.file_type().is_symlink()
        {
            return Ok(ToolResult::failure(format!(
                "Refusing to write through symlink: {}",
                target.display()
            )));
        }

        match tokio::fs::write(&target, content).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Written {} bytes to {path}",
                content.len()
            ))),
            Err(e) => Ok(ToolResult::failure(format!("Failed to write file: {e}"))),
        }
    }
}
