mod common;
pub mod file_read;
pub mod file_write;
pub mod registry;
pub mod traits;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use registry::ToolRegistry;
pub use traits::{Tool, ToolContext, ToolExecutor, ToolResult, ToolSpec};
