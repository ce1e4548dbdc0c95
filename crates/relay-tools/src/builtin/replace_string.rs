//! `replace_string_in_file` — literal substring replacement, with an
//! optional single-occurrence guard.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use relay_context::FileContent;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(rename = "oldString")]
    old_string: String,
    #[serde(rename = "newString")]
    new_string: String,
    #[serde(rename = "validateContext", default)]
    validate_context: bool,
}

pub struct ReplaceStringTool;

#[async_trait]
impl Tool for ReplaceStringTool {
    fn name(&self) -> &str {
        "replace_string_in_file"
    }

    fn description(&self) -> &str {
        "Replace a literal substring in a file, optionally requiring exactly one occurrence."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string"},
                "oldString": {"type": "string"},
                "newString": {"type": "string"},
                "validateContext": {"type": "boolean"}
            },
            "required": ["filePath", "oldString", "newString"]
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
        let content = match fs.read(&args.file_path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::err(e.to_string()),
        };

        let occurrences = content.matches(args.old_string.as_str()).count();
        if occurrences == 0 {
            return ToolResult::err("oldString not found in file");
        }
        if args.validate_context && occurrences > 1 {
            return ToolResult::err(format!(
                "oldString is ambiguous: {occurrences} occurrences found, expected exactly 1"
            ));
        }

        let updated = content.replacen(&args.old_string, &args.new_string, 1);
        match fs.write(&args.file_path, FileContent::Text(updated)).await {
            Ok(()) => ToolResult::ok(serde_json::json!({ "filePath": args.file_path, "replacements": 1 })),
            Err(e) => ToolResult::err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_context::ContextRouter;
    use std::sync::Arc;

    async fn ctx_with(content: &str) -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(ContextRouter::new(dir.path()));
        router.get_filesystem().write("f.txt", FileContent::Text(content.into())).await.unwrap();
        (dir, ToolContext::new(router))
    }

    #[tokio::test]
    async fn replaces_unique_occurrence() {
        let (_dir, ctx) = ctx_with("hello world").await;
        let result = ReplaceStringTool
            .invoke(
                serde_json::json!({"filePath": "f.txt", "oldString": "world", "newString": "rust"}),
                &ctx,
            )
            .await;
        assert!(result.success);
        assert_eq!(ctx.router.get_filesystem().read("f.txt").await.unwrap(), "hello rust");
    }

    #[tokio::test]
    async fn validate_context_rejects_ambiguous_match() {
        let (_dir, ctx) = ctx_with("foo foo").await;
        let result = ReplaceStringTool
            .invoke(
                serde_json::json!({
                    "filePath": "f.txt", "oldString": "foo", "newString": "bar",
                    "validateContext": true
                }),
                &ctx,
            )
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn missing_old_string_fails() {
        let (_dir, ctx) = ctx_with("hello").await;
        let result = ReplaceStringTool
            .invoke(
                serde_json::json!({"filePath": "f.txt", "oldString": "nope", "newString": "x"}),
                &ctx,
            )
            .await;
        assert!(!result.success);
    }
}
