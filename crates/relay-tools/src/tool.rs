//! The tool trait and its invocation contract.

use async_trait::async_trait;
use relay_context::ContextRouter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Resources a tool's `invoke` needs beyond its arguments: which context
/// (local/hop) is active, plus identifiers useful for namespacing output
/// (session id, workspace-relative media roots).
pub struct ToolContext {
    pub router: Arc<ContextRouter>,
    pub session_id: Option<String>,
}

impl ToolContext {
    pub fn new(router: Arc<ContextRouter>) -> Self {
        Self {
            router,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// The uniform result shape every tool invocation resolves to. Tools never
/// propagate a Rust `Result` across the dispatch boundary — a failure is
/// always `{success: false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// A named, schema-described, side-effecting operation invocable by any
/// agent through the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human/LLM-facing description, used for function-calling prompts.
    fn description(&self) -> &str;

    /// JSON-schema document describing the accepted `arguments`.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. Implementations must never `panic!` on bad input —
    /// validate and return `ToolResult::err` instead; the registry's
    /// dispatcher additionally catches unwinding panics as a last resort
    /// so a single buggy tool can never take down an agent run.
    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult;

    /// Whether invoking this tool should require interactive confirmation
    /// (e.g. a destructive filesystem write). Informational only — the
    /// core does not enforce it; a caller (chat service, CLI) may.
    fn requires_confirmation(&self) -> bool {
        false
    }
}
