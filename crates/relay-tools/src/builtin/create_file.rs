//! `create_file` — write a new file, optionally creating parent
//! directories.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use relay_context::FileContent;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(rename = "filePath")]
    file_path: String,
    content: String,
    #[serde(rename = "createDirectories", default)]
    create_directories: bool,
}

pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file with the given content."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string"},
                "content": {"type": "string"},
                "createDirectories": {"type": "boolean"}
            },
            "required": ["filePath", "content"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };

        let fs = ctx.router.get_filesystem();

        if args.create_directories {
            if let Some(parent) = Path::new(&args.file_path).parent() {
                let parent_str = parent.to_string_lossy();
                if !parent_str.is_empty() {
                    if let Err(e) = fs.create_directory(&parent_str).await {
                        return ToolResult::err(e.to_string());
                    }
                }
            }
        }

        match fs.write(&args.file_path, FileContent::Text(args.content)).await {
            Ok(()) => ToolResult::ok(serde_json::json!({ "filePath": args.file_path })),
            Err(e) => ToolResult::err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_context::ContextRouter;
    use std::sync::Arc;

    fn ctx() -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(ContextRouter::new(dir.path()));
        (dir, ToolContext::new(router))
    }

    #[tokio::test]
    async fn creates_parent_directories_when_asked() {
        let (_dir, ctx) = ctx();
        let result = CreateFileTool
            .invoke(
                serde_json::json!({
                    "filePath": "a/b/c.txt",
                    "content": "hi",
                    "createDirectories": true
                }),
                &ctx,
            )
            .await;
        assert!(result.success);
        let read = ctx.router.get_filesystem().read("a/b/c.txt").await.unwrap();
        assert_eq!(read, "hi");
    }

    #[tokio::test]
    async fn missing_parent_without_flag_fails() {
        let (_dir, ctx) = ctx();
        let result = CreateFileTool
            .invoke(
                serde_json::json!({"filePath": "missing/dir/c.txt", "content": "hi"}),
                &ctx,
            )
            .await;
        assert!(!result.success);
    }
}
