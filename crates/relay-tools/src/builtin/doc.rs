//! `read_doc` / `write_doc` — extension-dispatched document handlers.
//! Each handler implements [`DocHandler`]; dispatch picks one by file
//! extension.
//!
//! Binary office formats (Excel/Word/PDF/PowerPoint) require a parsing
//! crate that isn't part of this workspace's dependency stack to extract
//! structured content; see DESIGN.md for that decision. Their handlers
//! here implement what is structurally possible without one (size/metadata
//! reporting) and return `Unsupported` for content extraction rather than
//! silently returning empty content.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use relay_context::FileContent;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_MAX_CHARS: usize = 8000;
const DEFAULT_MAX_LINES: usize = 500;

/// A format-specific document reader/writer.
pub trait DocHandler: Send + Sync {
    fn extensions(&self) -> &[&str];
    fn read(&self, raw: &[u8], options: &ReadOptions) -> Result<DocContent, String>;
    fn write(&self, content: &str) -> Result<Vec<u8>, String>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadOptions {
    #[serde(default)]
    pub summary_only: bool,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(rename = "maxChars")]
    pub max_chars: Option<usize>,
    #[serde(rename = "maxLines")]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DocContent {
    pub content: String,
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slides: Option<Value>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation_info: Option<Value>,
}

/// Applies the shared character/line cap and summary-only preview rule
/// used by every handler.
fn cap_content(raw: &str, options: &ReadOptions) -> (String, bool, Option<Value>) {
    let max_chars = options.max_chars.unwrap_or(DEFAULT_MAX_CHARS);
    let max_lines = options.max_lines.unwrap_or(DEFAULT_MAX_LINES);

    if options.summary_only {
        let head: String = raw.lines().take(10).collect::<Vec<_>>().join("\n");
        let tail: String = raw.lines().rev().take(10).collect::<Vec<_>>().rev().collect::<Vec<_>>().join("\n");
        return (
            format!("{head}\n...\n{tail}"),
            true,
            Some(serde_json::json!({"mode": "summary"})),
        );
    }

    let lines: Vec<&str> = raw.lines().collect();
    let line_capped = lines.len() > max_lines;
    let by_lines = if line_capped {
        lines[..max_lines].join("\n")
    } else {
        raw.to_string()
    };

    let char_capped = by_lines.chars().count() > max_chars;
    let result: String = if char_capped {
        by_lines.chars().take(max_chars).collect()
    } else {
        by_lines
    };

    let truncated = line_capped || char_capped;
    let info = if truncated {
        Some(serde_json::json!({
            "line_capped": line_capped,
            "char_capped": char_capped,
            "max_chars": max_chars,
            "max_lines": max_lines,
        }))
    } else {
        None
    };

    (result, truncated, info)
}

pub struct CsvHandler;

impl DocHandler for CsvHandler {
    fn extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn read(&self, raw: &[u8], options: &ReadOptions) -> Result<DocContent, String> {
        let text = String::from_utf8_lossy(raw).to_string();
        let rows: Vec<Vec<String>> = text
            .lines()
            .map(|line| line.split(',').map(|c| c.trim().to_string()).collect())
            .collect();
        let (content, truncated, truncation_info) = cap_content(&text, options);
        Ok(DocContent {
            content,
            metadata: serde_json::json!({"rows": rows.len(), "format": "csv"}),
            tables: Some(serde_json::json!([rows])),
            sheets: None,
            pages: None,
            slides: None,
            truncated,
            truncation_info,
        })
    }

    fn write(&self, content: &str) -> Result<Vec<u8>, String> {
        Ok(content.as_bytes().to_vec())
    }
}

pub struct PlainTextHandler;

impl DocHandler for PlainTextHandler {
    fn extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn read(&self, raw: &[u8], options: &ReadOptions) -> Result<DocContent, String> {
        let text = String::from_utf8_lossy(raw).to_string();
        let (content, truncated, truncation_info) = cap_content(&text, options);
        Ok(DocContent {
            content,
            metadata: serde_json::json!({"format": "text"}),
            tables: None,
            sheets: None,
            pages: None,
            slides: None,
            truncated,
            truncation_info,
        })
    }

    fn write(&self, content: &str) -> Result<Vec<u8>, String> {
        Ok(content.as_bytes().to_vec())
    }
}

/// Stands in for the binary office handlers (Excel/Word/PDF/PowerPoint):
/// reports that content extraction needs an external parser, rather than
/// silently returning empty content.
pub struct UnsupportedBinaryHandler {
    exts: Vec<&'static str>,
    format: &'static str,
}

impl UnsupportedBinaryHandler {
    pub fn excel() -> Self {
        Self { exts: vec!["xlsx", "xls"], format: "excel" }
    }
    pub fn word() -> Self {
        Self { exts: vec!["docx", "doc"], format: "word" }
    }
    pub fn pdf() -> Self {
        Self { exts: vec!["pdf"], format: "pdf" }
    }
    pub fn powerpoint() -> Self {
        Self { exts: vec!["pptx", "ppt"], format: "powerpoint" }
    }
}

impl DocHandler for UnsupportedBinaryHandler {
    fn extensions(&self) -> &[&str] {
        &self.exts
    }

    fn read(&self, raw: &[u8], _options: &ReadOptions) -> Result<DocContent, String> {
        Err(format!(
            "{} content extraction requires an external parser crate not available in this build ({} bytes on disk)",
            self.format,
            raw.len()
        ))
    }

    fn write(&self, _content: &str) -> Result<Vec<u8>, String> {
        Err(format!("{} writing requires an external writer crate not available in this build", self.format))
    }
}

pub struct DocHandlerRegistry {
    handlers: HashMap<String, std::sync::Arc<dyn DocHandler>>,
}

impl DocHandlerRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self { handlers: HashMap::new() };
        registry.register(std::sync::Arc::new(CsvHandler));
        registry.register(std::sync::Arc::new(PlainTextHandler));
        registry.register(std::sync::Arc::new(UnsupportedBinaryHandler::excel()));
        registry.register(std::sync::Arc::new(UnsupportedBinaryHandler::word()));
        registry.register(std::sync::Arc::new(UnsupportedBinaryHandler::pdf()));
        registry.register(std::sync::Arc::new(UnsupportedBinaryHandler::powerpoint()));
        registry
    }

    pub fn register(&mut self, handler: std::sync::Arc<dyn DocHandler>) {
        for ext in handler.extensions() {
            self.handlers.insert(ext.to_string(), handler.clone());
        }
    }

    pub fn for_extension(&self, ext: &str) -> Option<std::sync::Arc<dyn DocHandler>> {
        self.handlers.get(ext).cloned()
    }
}

impl Default for DocHandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn extension_of(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(default)]
    options: ReadOptions,
}

pub struct ReadDocTool {
    registry: DocHandlerRegistry,
}

impl ReadDocTool {
    pub fn new() -> Self {
        Self { registry: DocHandlerRegistry::with_defaults() }
    }
}

impl Default for ReadDocTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadDocTool {
    fn name(&self) -> &str {
        "read_doc"
    }

    fn description(&self) -> &str {
        "Read a document (csv/txt/md fully supported; office binary formats report size/metadata only), dispatching by file extension."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string"},
                "options": {"type": "object"}
            },
            "required": ["filePath"]
        })
    }

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: ReadArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };

        let ext = extension_of(&args.file_path);
        let Some(handler) = self.registry.for_extension(&ext) else {
            return ToolResult::err(format!("unsupported document extension: .{ext}"));
        };

        let fs = ctx.router.get_filesystem();
        let raw = match fs.read_binary(&args.file_path).await {
            Ok(bytes) => bytes,
            Err(e) => return ToolResult::err(e.to_string()),
        };

        match handler.read(&raw, &args.options) {
            Ok(doc) => match serde_json::to_value(doc) {
                Ok(v) => ToolResult::ok(v),
                Err(e) => ToolResult::err(format!("failed to encode document: {e}")),
            },
            Err(e) => ToolResult::err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    #[serde(rename = "filePath")]
    file_path: String,
    content: String,
}

pub struct WriteDocTool {
    registry: DocHandlerRegistry,
}

impl WriteDocTool {
    pub fn new() -> Self {
        Self { registry: DocHandlerRegistry::with_defaults() }
    }
}

impl Default for WriteDocTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteDocTool {
    fn name(&self) -> &str {
        "write_doc"
    }

    fn description(&self) -> &str {
        "Write a document, dispatching by file extension to a format handler."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["filePath", "content"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: WriteArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };

        let ext = extension_of(&args.file_path);
        let Some(handler) = self.registry.for_extension(&ext) else {
            return ToolResult::err(format!("unsupported document extension: .{ext}"));
        };

        let bytes = match handler.write(&args.content) {
            Ok(b) => b,
            Err(e) => return ToolResult::err(e),
        };

        let fs = ctx.router.get_filesystem();
        match fs.write(&args.file_path, FileContent::Bytes(bytes)).await {
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
    async fn reads_csv_as_table() {
        let (_dir, ctx) = ctx();
        WriteDocTool::new()
            .invoke(
                serde_json::json!({"filePath": "t.csv", "content": "a,b\n1,2"}),
                &ctx,
            )
            .await;
        let result = ReadDocTool::new()
            .invoke(serde_json::json!({"filePath": "t.csv"}), &ctx)
            .await;
        assert!(result.success);
        assert!(result.data.unwrap()["tables"].is_array());
    }

    #[tokio::test]
    async fn unsupported_binary_extension_reports_error_not_empty_content() {
        let (_dir, ctx) = ctx();
        ctx.router
            .get_filesystem()
            .write("a.pdf", relay_context::FileContent::Bytes(vec![0u8; 16]))
            .await
            .unwrap();
        let result = ReadDocTool::new()
            .invoke(serde_json::json!({"filePath": "a.pdf"}), &ctx)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("pdf"));
    }

    #[tokio::test]
    async fn caps_content_by_line_count() {
        let (_dir, ctx) = ctx();
        let long = (0..1000).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        WriteDocTool::new()
            .invoke(serde_json::json!({"filePath": "t.txt", "content": long}), &ctx)
            .await;
        let result = ReadDocTool::new()
            .invoke(serde_json::json!({"filePath": "t.txt"}), &ctx)
            .await;
        let data = result.data.unwrap();
        assert_eq!(data["truncated"], true);
    }
}
