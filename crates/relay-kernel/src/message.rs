//! The core [`Message`] record and its attachment model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

/// The logical kind of a message, orthogonal to `Sender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    Status,
    Error,
    Typing,
}

/// Which attachment bucket a file belongs to, used to pick a storage
/// sub-directory under the media root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Images,
    Audio,
    Files,
}

/// A normalized reference to an uploaded or generated file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_path: Option<String>,
    pub kind: AttachmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Attachment {
    /// Bucket a mime type into an [`AttachmentKind`], the way the media
    /// store's upload path decides which sub-directory to write into.
    pub fn kind_for_mime(mime_type: &str) -> AttachmentKind {
        if mime_type.starts_with("image/") {
            AttachmentKind::Images
        } else if mime_type.starts_with("audio/") {
            AttachmentKind::Audio
        } else {
            AttachmentKind::Files
        }
    }
}

/// An immutable chat record. `sender = User` messages arrive only from the
/// transport layer; `sender = Ai` messages are produced only by an agent
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub sender: Sender,
    pub kind: MessageKind,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(
        session_id: impl Into<String>,
        sender: Sender,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            sender,
            kind,
            content: content.into(),
            timestamp: now_millis(),
            metadata: HashMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, Sender::User, MessageKind::Message, content)
    }

    pub fn ai(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, Sender::Ai, MessageKind::Message, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn metadata_bool(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_bucketing() {
        assert_eq!(Attachment::kind_for_mime("image/png"), AttachmentKind::Images);
        assert_eq!(Attachment::kind_for_mime("audio/mpeg"), AttachmentKind::Audio);
        assert_eq!(Attachment::kind_for_mime("application/pdf"), AttachmentKind::Files);
    }

    #[test]
    fn round_trips_through_json() {
        let msg = Message::user("sess1", "hello").with_metadata("foo", serde_json::json!(true));
        let json = serde_json::to_string(&msg).unwrap();
        let de: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(de.session_id, "sess1");
        assert_eq!(de.sender, Sender::User);
        assert!(de.metadata_bool("foo"));
    }

    #[test]
    fn streaming_complete_flag_defaults_false() {
        let msg = Message::ai("sess1", "hi");
        assert!(!msg.metadata_bool("streaming_complete"));
    }
}
