//! `AgentMessage` — the item type of an agent run's output sequence.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMessageKind {
    Text,
    Error,
    ToolUse,
    ToolResult,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentMessage {
    pub agent_id: String,
    pub content: String,
    pub kind: AgentMessageKind,
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AgentMessage {
    pub fn text(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            kind: AgentMessageKind::Text,
            timestamp: relay_kernel::message::now_millis(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn error(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            kind: AgentMessageKind::Error,
            timestamp: relay_kernel::message::now_millis(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn tool_use(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            kind: AgentMessageKind::ToolUse,
            timestamp: relay_kernel::message::now_millis(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn tool_result(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            kind: AgentMessageKind::ToolResult,
            timestamp: relay_kernel::message::now_millis(),
            metadata: serde_json::Value::Null,
        }
    }
}
