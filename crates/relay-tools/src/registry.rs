//! The tool registry: a name→tool map populated at startup, with
//! idempotent registration and a dispatcher that converts any escape
//! (error or panic) from a tool into `{success:false, error}`.

use crate::tool::{Tool, ToolContext, ToolResult};
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

/// Holds every registered tool, keyed by name. Lookup is lock-free
/// (backed by `DashMap`); registration replaces any existing entry under
/// the same name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Registering under a name that already exists
    /// replaces the previous tool.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "tool re-registered, replacing previous instance");
        }
    }

    /// Returns the tool, or `None` if no tool is registered under that name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|e| e.key().clone()).collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|e| ToolDescriptor::from_tool(e.value().as_ref()))
            .collect()
    }

    /// Look up and invoke a tool by name. An unknown tool name, a tool
    /// whose `invoke` returns an error-shaped result, or a tool that
    /// unwinds via panic all resolve to `{success:false, error}` — no
    /// escape can terminate the enclosing agent run.
    pub async fn dispatch(&self, name: &str, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::err(format!("unknown tool: {name}"));
        };

        let fut = AssertUnwindSafe(tool.invoke(arguments, ctx)).catch_unwind();
        match fut.await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&panic);
                error!(tool = %name, %message, "tool invocation panicked");
                ToolResult::err(format!("tool '{name}' panicked: {message}"))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Self-description of a tool, consumed by an LLM framework adapter for
/// function-calling prompts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}
