//! `semantic_search` — content/filename/regex search with a tiered
//! fallback for the `smart` mode.
//!
//! Rather than shelling out to `ripgrep`, this implements the same
//! tiering in pure Rust against the context router's filesystem so the
//! fallback behavior is observable and testable without depending on an
//! external binary being installed. See DESIGN.md for that tradeoff.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Mode {
    #[default]
    Smart,
    Content,
    Filename,
    Regex,
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(rename = "fileTypes", default)]
    file_types: Option<Vec<String>>,
    #[serde(default)]
    mode: Mode,
    #[serde(rename = "contextLines", default)]
    context_lines: usize,
    #[serde(rename = "maxResults", default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    50
}

#[derive(Debug, Clone, serde::Serialize)]
struct Hit {
    file: String,
    line: Option<u64>,
    snippet: Option<String>,
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(rename = "pathInfo")]
    path_info: PathInfo,
}

#[derive(Debug, Clone, serde::Serialize)]
struct PathInfo {
    context_id: String,
    absolute_path: String,
}

pub struct SemanticSearchTool;

#[async_trait]
impl Tool for SemanticSearchTool {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Search the workspace for content, filenames, or a regex pattern, with a tiered fallback in 'smart' mode."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "scope": {"type": "string"},
                "fileTypes": {"type": "array", "items": {"type": "string"}},
                "mode": {"type": "string", "enum": ["smart", "content", "filename", "regex"]},
                "contextLines": {"type": "integer"},
                "maxResults": {"type": "integer"},
                "root": {"type": "string", "enum": ["workspace", "repo"]}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        if args.query.trim().is_empty() {
            return ToolResult::err("query must not be empty");
        }

        let root = ctx.router.local_workspace_root().to_path_buf();
        let search_root = match &args.scope {
            Some(scope) => root.join(scope),
            None => root.clone(),
        };

        let files = collect_files(&search_root, args.file_types.as_deref());

        let hits = match args.mode {
            Mode::Filename => search_filenames(&files, &args.query, args.max_results),
            Mode::Regex => match Regex::new(&args.query) {
                Ok(re) => search_content(&files, &re, args.context_lines, args.max_results),
                Err(e) => return ToolResult::err(format!("invalid regex: {e}")),
            },
            Mode::Content => {
                let escaped = regex::escape(&args.query);
                let re = Regex::new(&escaped).expect("escaped literal is always valid");
                search_content(&files, &re, args.context_lines, args.max_results)
            }
            Mode::Smart => smart_search(&files, &args.query, args.context_lines, args.max_results),
        };

        let ctx_id = ctx.router.active_context_id();
        let results: Vec<Hit> = hits
            .into_iter()
            .map(|(file, line, snippet)| {
                let abs = file.clone();
                Hit {
                    file: file.clone(),
                    line,
                    snippet,
                    file_path: ctx.router.format_namespaced_path(&ctx_id, &abs),
                    path_info: PathInfo {
                        context_id: ctx_id.clone(),
                        absolute_path: abs,
                    },
                }
            })
            .collect();

        ToolResult::ok(serde_json::json!({ "results": results }))
    }
}

fn collect_files(root: &Path, file_types: Option<&[String]>) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    walk(root, file_types, &mut out);
    out
}

fn walk(dir: &Path, file_types: Option<&[String]>, out: &mut Vec<std::path::PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, file_types, out);
            continue;
        }
        if let Some(types) = file_types {
            let ext_ok = path
                .extension()
                .map(|e| types.iter().any(|t| t.trim_start_matches('.') == e.to_string_lossy()))
                .unwrap_or(false);
            if !ext_ok {
                continue;
            }
        }
        out.push(path);
    }
}

fn search_filenames(files: &[std::path::PathBuf], query: &str, max_results: usize) -> Vec<(String, Option<u64>, Option<String>)> {
    let needle = query.to_lowercase();
    files
        .iter()
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .take(max_results)
        .map(|p| (p.to_string_lossy().to_string(), None, None))
        .collect()
}

fn search_content(
    files: &[std::path::PathBuf],
    re: &Regex,
    context_lines: usize,
    max_results: usize,
) -> Vec<(String, Option<u64>, Option<String>)> {
    let mut out = Vec::new();
    'files: for path in files {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        let lines: Vec<&str> = contents.lines().collect();
        for (idx, line) in lines.iter().enumerate() {
            if re.is_match(line) {
                let snippet = if context_lines == 0 {
                    line.trim().to_string()
                } else {
                    let start = idx.saturating_sub(context_lines);
                    let end = (idx + context_lines + 1).min(lines.len());
                    lines[start..end].join("\n")
                };
                out.push((path.to_string_lossy().to_string(), Some((idx + 1) as u64), Some(snippet)));
                if out.len() >= max_results {
                    break 'files;
                }
            }
        }
    }
    out
}

/// Tiered fallback: ① literal fixed-string case-sensitive ② case-insensitive
/// ③ AND-of-tokens (≥3 char tokens) ④ OR-of-tokens. Stops at the first tier
/// that yields at least one result.
fn smart_search(
    files: &[std::path::PathBuf],
    query: &str,
    context_lines: usize,
    max_results: usize,
) -> Vec<(String, Option<u64>, Option<String>)> {
    let literal = regex::escape(query);

    // Tier 1: literal, case-sensitive.
    if let Ok(re) = Regex::new(&literal) {
        let hits = search_content(files, &re, context_lines, max_results);
        if !hits.is_empty() {
            return hits;
        }
    }

    // Tier 2: literal, case-insensitive.
    if let Ok(re) = RegexBuilder::new(&literal).case_insensitive(true).build() {
        let hits = search_content(files, &re, context_lines, max_results);
        if !hits.is_empty() {
            return hits;
        }
    }

    let tokens: Vec<&str> = query.split_whitespace().filter(|t| t.len() >= 3).collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    // Tier 3: AND of tokens — a lookahead per token, case-insensitive.
    let and_pattern = tokens
        .iter()
        .map(|t| format!("(?=.*{})", regex::escape(t)))
        .collect::<String>();
    if let Ok(re) = RegexBuilder::new(&and_pattern).case_insensitive(true).build() {
        let hits = search_content(files, &re, context_lines, max_results);
        if !hits.is_empty() {
            return hits;
        }
    }

    // Tier 4: OR of tokens.
    let or_pattern = tokens.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    if let Ok(re) = RegexBuilder::new(&or_pattern).case_insensitive(true).build() {
        return search_content(files, &re, context_lines, max_results);
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_context::ContextRouter;
    use std::sync::Arc;

    async fn ctx_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let router = Arc::new(ContextRouter::new(dir.path()));
        (dir, ToolContext::new(router))
    }

    #[tokio::test]
    async fn smart_mode_falls_back_to_case_insensitive_tier() {
        let (_dir, ctx) = ctx_with(&[("a.txt", "this contains a NEEDLE value")]).await;
        let result = SemanticSearchTool
            .invoke(serde_json::json!({"query": "needle", "mode": "smart"}), &ctx)
            .await;
        assert!(result.success);
        let results = result.data.unwrap()["results"].as_array().unwrap().clone();
        assert_eq!(results.len(), 1);
        assert!(results[0]["filePath"].as_str().unwrap().starts_with("local:"));
    }

    #[tokio::test]
    async fn filename_mode_matches_substring() {
        let (_dir, ctx) = ctx_with(&[("report_final.md", "x")]).await;
        let result = SemanticSearchTool
            .invoke(serde_json::json!({"query": "final", "mode": "filename"}), &ctx)
            .await;
        let results = result.data.unwrap()["results"].as_array().unwrap().clone();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (_dir, ctx) = ctx_with(&[]).await;
        let result = SemanticSearchTool
            .invoke(serde_json::json!({"query": ""}), &ctx)
            .await;
        assert!(!result.success);
    }
}
