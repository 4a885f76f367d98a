use super::traits::ToolContext;
use crate::error::ToolError;
use serde_json::{Map, Value, json};
use std::path::{Component, Path, PathBuf};

pub(crate) fn workspace_path_property() -> Value {
    json!({
        "type": "string",
        "description": "Relative path to the file within the workspace"
    })
}

pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidParameters {
            name: tool.to_string(),
            message: format!("missing '{key}' parameter"),
        })
}

/// Resolve a tool path against the workspace. Absolute paths, `..`
/// components and NUL bytes are refused.
pub(crate) fn workspace_path(ctx: &ToolContext, path: &str) -> Option<PathBuf> {
    if path.is_empty() || path.contains('\0') {
        return None;
    }

    let lower = path.to_lowercase();
    if lower.contains("..%2f") || lower.contains("%2f..") {
        return None;
    }

    let relative = Path::new(path);
    let escapes = relative.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || relative.is_absolute() {
        return None;
    }

    Some(ctx.workspace_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_under_workspace() {
        let ctx = ToolContext::new("/work");
        assert_eq!(
            workspace_path(&ctx, "notes/a.md"),
            Some(PathBuf::from("/work/notes/a.md"))
        );
    }

    #[test]
    fn escaping_paths_are_refused() {
        let ctx = ToolContext::new("/work");
        assert!(workspace_path(&ctx, "../secret").is_none());
        assert!(workspace_path(&ctx, "a/../../b").is_none());
        assert!(workspace_path(&ctx, "/etc/passwd").is_none());
        assert!(workspace_path(&ctx, "..%2fetc").is_none());
        assert!(workspace_path(&ctx, "").is_none());
    }

    #[test]
    fn required_str_reports_missing_key() {
        let err = required_str("file_read", &Map::new(), "path").unwrap_err();
        assert_eq!(
            err.to_string(),
            "tool file_read rejected parameters: missing 'path' parameter"
        );
    }
}
