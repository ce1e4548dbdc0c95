//! `read_file` — read a whole file or a line range.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(rename = "startLine")]
    start_line: Option<usize>,
    #[serde(rename = "endLine")]
    end_line: Option<usize>,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file, optionally a line range, from the active workspace."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string"},
                "startLine": {"type": "integer"},
                "endLine": {"type": "integer"}
            },
            "required": ["filePath"]
        })
    }

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };

        let fs = ctx.router.get_filesystem();
        match fs.read(&args.file_path).await {
            Ok(content) => {
                let sliced = match (args.start_line, args.end_line) {
                    (None, None) => content,
                    (start, end) => slice_lines(&content, start.unwrap_or(1), end),
                };
                ToolResult::ok(serde_json::json!({ "content": sliced }))
            }
            Err(e) => ToolResult::err(e.to_string()),
        }
    }
}

fn slice_lines(content: &str, start: usize, end: Option<usize>) -> String {
    let start = start.max(1);
    content
        .lines()
        .enumerate()
        .filter(|(idx, _)| {
            let line_no = idx + 1;
            line_no >= start && end.map(|e| line_no <= e).unwrap_or(true)
        })
        .map(|(_, l)| l)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_context::{ContextRouter, FileContent};
    use std::sync::Arc;

    async fn ctx_with_file(content: &str) -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(ContextRouter::new(dir.path()));
        router.get_filesystem().write("a.txt", FileContent::Text(content.into())).await.unwrap();
        let ctx = ToolContext::new(router);
        (dir, ctx)
    }

    #[tokio::test]
    async fn reads_whole_file() {
        let (_dir, ctx) = ctx_with_file("one\ntwo\nthree").await;
        let result = ReadFileTool
            .invoke(serde_json::json!({"filePath": "a.txt"}), &ctx)
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["content"], "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn reads_line_range() {
        let (_dir, ctx) = ctx_with_file("one\ntwo\nthree").await;
        let result = ReadFileTool
            .invoke(
                serde_json::json!({"filePath": "a.txt", "startLine": 2, "endLine": 2}),
                &ctx,
            )
            .await;
        assert_eq!(result.data.unwrap()["content"], "two");
    }

    #[tokio::test]
    async fn escaping_path_fails() {
        let (_dir, ctx) = ctx_with_file("x").await;
        let result = ReadFileTool
            .invoke(serde_json::json!({"filePath": "../../etc/passwd"}), &ctx)
            .await;
        assert!(!result.success);
    }
}
