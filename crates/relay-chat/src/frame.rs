//! Transport frame shapes: the logical JSON exchanged between a client
//! connection and the chat service.

use relay_kernel::{Attachment, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    StreamStart,
    StreamChunk,
    StreamEnd,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageStreamFrame {
    pub id: String,
    pub event: StreamEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    pub sender: String,
    pub timestamp: i64,
    #[serde(rename = "agentId", skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "agentName", skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(rename = "agentType", skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    pub session_id: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusInfo {
    pub available: bool,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// Server -> client frames. Internally tagged on `"type"`; variant names
/// convert to the snake_case wire names (`message`, `message_stream`,
/// `typing`, `stream_stopped`, `agent_status`, `config`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message { message: Message },
    MessageStream(MessageStreamFrame),
    Typing { session_id: String, is_typing: bool, timestamp: i64 },
    StreamStopped { session_id: String, timestamp: i64, message: String },
    AgentStatus { agent: AgentStatusInfo },
    Config { config: Value, timestamp: i64 },
}

impl ServerFrame {
    pub fn stream_start(id: impl Into<String>, session_id: impl Into<String>, agent_id: Option<String>, agent_name: Option<String>, agent_type: Option<String>) -> Self {
        ServerFrame::MessageStream(MessageStreamFrame {
            id: id.into(),
            event: StreamEvent::StreamStart,
            chunk: None,
            sender: "ai".to_string(),
            timestamp: relay_kernel::message::now_millis(),
            agent_id,
            agent_name,
            agent_type,
            session_id: session_id.into(),
            metadata: Value::Null,
        })
    }

    pub fn stream_chunk(id: impl Into<String>, session_id: impl Into<String>, chunk: impl Into<String>) -> Self {
        ServerFrame::MessageStream(MessageStreamFrame {
            id: id.into(),
            event: StreamEvent::StreamChunk,
            chunk: Some(chunk.into()),
            sender: "ai".to_string(),
            timestamp: relay_kernel::message::now_millis(),
            agent_id: None,
            agent_name: None,
            agent_type: None,
            session_id: session_id.into(),
            metadata: Value::Null,
        })
    }

    pub fn stream_end(id: impl Into<String>, session_id: impl Into<String>) -> Self {
        ServerFrame::MessageStream(MessageStreamFrame {
            id: id.into(),
            event: StreamEvent::StreamEnd,
            chunk: None,
            sender: "ai".to_string(),
            timestamp: relay_kernel::message::now_millis(),
            agent_id: None,
            agent_name: None,
            agent_type: None,
            session_id: session_id.into(),
            metadata: Value::Null,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMetadata {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Client -> server frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "message")]
    Message {
        content: String,
        #[serde(default)]
        metadata: InboundMetadata,
    },
    #[serde(rename = "stop_streaming")]
    StopStreaming { session_id: String },
    #[serde(rename = "get_history")]
    GetHistory {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default)]
        offset: usize,
    },
    #[serde(rename = "sessions.create")]
    SessionsCreate {
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename = "sessions.update")]
    SessionsUpdate { id: String, name: String },
    #[serde(rename = "sessions.delete")]
    SessionsDelete { id: String },
    #[serde(rename = "sessions.list")]
    SessionsList {},
}

fn default_limit() -> usize {
    50
}
