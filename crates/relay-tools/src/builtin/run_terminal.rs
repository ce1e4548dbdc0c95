//! `run_in_terminal` — execute a shell command via the context router's
//! terminal. Background mode returns immediately with a pid; foreground
//! mode returns the full status/stdout/stderr.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const FOREGROUND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Args {
    command: String,
    #[allow(dead_code)]
    explanation: Option<String>,
    #[serde(rename = "isBackground", default)]
    is_background: bool,
}

pub struct RunInTerminalTool;

#[async_trait]
impl Tool for RunInTerminalTool {
    fn name(&self) -> &str {
        "run_in_terminal"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the active context's terminal."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "explanation": {"type": "string"},
                "isBackground": {"type": "boolean"}
            },
            "required": ["command", "explanation"]
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

        let terminal = ctx.router.get_terminal();

        if args.is_background {
            let terminal = terminal;
            let command = args.command.clone();
            tokio::spawn(async move {
                let _ = terminal.execute_command(&command).await;
            });
            return ToolResult::ok(serde_json::json!({ "background": true }));
        }

        match tokio::time::timeout(FOREGROUND_TIMEOUT, terminal.execute_command(&args.command)).await {
            Ok(Ok(output)) => ToolResult::ok(serde_json::json!({
                "status": output.status,
                "stdout": output.stdout,
                "stderr": output.stderr,
                "pid": output.pid,
                "context_id": output.context_id,
            })),
            Ok(Err(e)) => ToolResult::err(e.to_string()),
            Err(_) => ToolResult::err("command timed out"),
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
    async fn runs_foreground_command() {
        let (_dir, ctx) = ctx();
        let result = RunInTerminalTool
            .invoke(
                serde_json::json!({"command": "echo hi", "explanation": "test", "isBackground": false}),
                &ctx,
            )
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["stdout"].as_str().unwrap().trim(), "hi");
    }

    #[tokio::test]
    async fn background_command_returns_immediately() {
        let (_dir, ctx) = ctx();
        let result = RunInTerminalTool
            .invoke(
                serde_json::json!({"command": "sleep 5", "explanation": "test", "isBackground": true}),
                &ctx,
            )
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["background"], true);
    }
}
