//! `ChatService` — the streaming core: session resolution, inbound
//! message handling, streaming fan-out, session CRUD, and history
//! retrieval.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use relay_agent::{AgentMessageKind, AgentSession};
use relay_kernel::message::now_millis;
use relay_kernel::{Attachment, AttachmentKind, KernelError, KernelResult, Message, MessageKind, Sender};
use relay_llm::ImageResolver;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use crate::agent_source::{BoxAgentStream, CustomAgent};
use crate::batching::{BatchingConfig, ChunkBatcher};
use crate::frame::{InboundMetadata, ServerFrame};
use crate::persister::{self, ChatPersister};

const BROADCAST_CAPACITY: usize = 256;
const HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<i64>,
}

pub struct ChatService {
    workspace_root: PathBuf,
    persister: Arc<ChatPersister>,
    broadcasters: DashMap<String, broadcast::Sender<Arc<Value>>>,
    connections: DashMap<String, String>,
    custom_agents: DashMap<String, Arc<dyn CustomAgent>>,
    default_agent: RwLock<Option<Arc<AgentSession>>>,
    batching: BatchingConfig,
    stop_flags: DashMap<String, Arc<AtomicBool>>,
    flusher: Option<tokio::task::JoinHandle<()>>,
    image_resolver: ImageResolver,
}

impl ChatService {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Arc<Self> {
        let workspace_root = workspace_root.into();
        let persister = Arc::new(ChatPersister::new(workspace_root.clone()));
        let flusher = Some(persister.spawn_flusher(std::time::Duration::from_millis(flush_interval_ms())));
        let image_resolver = ImageResolver::new(workspace_root.join("media"), workspace_root.clone(), "/api/media/file");
        Arc::new(Self {
            workspace_root,
            persister,
            broadcasters: DashMap::new(),
            connections: DashMap::new(),
            custom_agents: DashMap::new(),
            default_agent: RwLock::new(None),
            batching: BatchingConfig::from_env(),
            stop_flags: DashMap::new(),
            flusher,
            image_resolver,
        })
    }

    pub async fn set_default_agent(&self, agent: Arc<AgentSession>) {
        *self.default_agent.write().await = Some(agent);
    }

    pub fn register_custom_agent(&self, agent: Arc<dyn CustomAgent>) {
        self.custom_agents.insert(agent.agent_type().to_string(), agent);
    }

    /// Flushes every pending message synchronously. Must be awaited at
    /// shutdown; flush-on-shutdown is mandatory, not best-effort.
    pub async fn shutdown(&self) {
        if let Some(handle) = &self.flusher {
            handle.abort();
        }
        if let Err(e) = self.persister.flush_all().await {
            warn!(error = %e, "final chat flush failed during shutdown");
        }
    }

    // ---- connection / session plumbing ----------------------------------

    pub async fn bind_connection(&self, conn_id: impl Into<String>, session_id: impl Into<String>) -> broadcast::Receiver<Arc<Value>> {
        let conn_id = conn_id.into();
        let session_id = session_id.into();
        let _ = self.persister.touch_session(&session_id).await;
        self.connections.insert(conn_id, session_id.clone());
        self.sender_for(&session_id).subscribe()
    }

    pub fn unbind_connection(&self, conn_id: &str) {
        self.connections.remove(conn_id);
    }

    fn sender_for(&self, session_id: &str) -> broadcast::Sender<Arc<Value>> {
        self.broadcasters.entry(session_id.to_string()).or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0).clone()
    }

    async fn send_frame(&self, session_id: &str, frame: ServerFrame) {
        if let Ok(value) = serde_json::to_value(&frame) {
            let _ = self.sender_for(session_id).send(Arc::new(value));
        }
    }

    async fn resolve_session(&self, conn_id: &str, explicit: Option<&str>) -> KernelResult<String> {
        let session_id = match explicit {
            Some(id) => id.to_string(),
            None => self.connections.get(conn_id).map(|r| r.clone()).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        };
        self.persister.touch_session(&session_id).await?;
        self.connections.insert(conn_id.to_string(), session_id.clone());
        Ok(session_id)
    }

    async fn set_typing(&self, session_id: &str, is_typing: bool) {
        self.send_frame(session_id, ServerFrame::Typing { session_id: session_id.to_string(), is_typing, timestamp: now_millis() }).await;
    }

    // ---- inbound message pipeline -----------------------------------------

    pub async fn handle_user_message(&self, conn_id: &str, content: String, metadata: InboundMetadata) -> KernelResult<String> {
        let session_id = self.resolve_session(conn_id, metadata.session_id.as_deref()).await?;

        let attachments = normalize_attachments(metadata.attachments.clone());
        let user_message = Message::user(&session_id, content).with_attachments(attachments);
        self.persister.enqueue(user_message.clone());
        self.send_frame(&session_id, ServerFrame::Message { message: user_message.clone() }).await;

        self.set_typing(&session_id, true).await;

        let message_id = uuid::Uuid::new_v4().to_string();
        self.send_frame(&session_id, ServerFrame::stream_start(&message_id, &session_id, None, None, metadata.agent_type.clone())).await;

        let history = persister::read_session(&self.workspace_root, &session_id).await?;
        let window_start = history.len().saturating_sub(HISTORY_WINDOW);
        let history_window = &history[window_start..];

        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flags.insert(session_id.clone(), stop_flag.clone());

        let mut stream = self.dispatch(&metadata.agent_type, history_window, &user_message).await?;

        let mut aggregated = String::new();
        let mut had_error = false;
        let mut stopped = false;
        let mut batcher = ChunkBatcher::new(self.batching.clone());

        while let Some(agent_message) = stream.next().await {
            if stop_flag.load(Ordering::SeqCst) {
                stopped = true;
                break;
            }
            match agent_message.kind {
                AgentMessageKind::Text => {
                    aggregated.push_str(&agent_message.content);
                    if let Some(batch) = batcher.push(agent_message.content) {
                        self.send_frame(&session_id, ServerFrame::stream_chunk(&message_id, &session_id, batch)).await;
                    }
                }
                AgentMessageKind::Error => {
                    had_error = true;
                    if let Some(batch) = batcher.flush() {
                        self.send_frame(&session_id, ServerFrame::stream_chunk(&message_id, &session_id, batch)).await;
                    }
                    self.send_frame(&session_id, ServerFrame::stream_chunk(&message_id, &session_id, agent_message.content.clone())).await;
                    aggregated.push_str(&agent_message.content);
                    break;
                }
                AgentMessageKind::ToolUse | AgentMessageKind::ToolResult => {}
            }
        }
        if let Some(batch) = batcher.flush() {
            self.send_frame(&session_id, ServerFrame::stream_chunk(&message_id, &session_id, batch)).await;
        }

        self.stop_flags.remove(&session_id);
        self.set_typing(&session_id, false).await;

        if stopped {
            self.send_frame(&session_id, ServerFrame::StreamStopped { session_id: session_id.clone(), timestamp: now_millis(), message: "stream stopped by client".to_string() }).await;
        }
        self.send_frame(&session_id, ServerFrame::stream_end(&message_id, &session_id)).await;

        let mut ai_message = Message::ai(&session_id, aggregated).with_id(message_id.clone());
        ai_message = ai_message.with_metadata("streaming_complete", json!(true));
        if had_error {
            ai_message = ai_message.with_metadata("has_error", json!(true));
        }
        // Not broadcast: clients reconstruct the final message from the
        // stream frames already sent.
        self.persister.enqueue(ai_message);

        Ok(message_id)
    }

    async fn dispatch(&self, agent_type: &Option<String>, history: &[Message], current_turn: &Message) -> KernelResult<BoxAgentStream> {
        if let Some(kind) = agent_type {
            if let Some(agent) = self.custom_agents.get(kind) {
                return Ok(agent.run_streaming(history, current_turn).await);
            }
        }
        let default = self.default_agent.read().await;
        match default.as_ref() {
            Some(agent) => {
                let transcript = render_transcript(history, current_turn);
                let images = self.resolve_image_attachments(current_turn);
                Ok(Box::pin(agent.execute_multimodal(transcript, images, None)))
            }
            None => Err(KernelError::not_found("no default agent configured and no matching custom agent type")),
        }
    }

    /// Resolves every image attachment on `message` to a content part via
    /// [`ImageResolver`], so the default agent sees the actual image data
    /// (or a reference to it) instead of a bare filename in the flattened
    /// transcript.
    fn resolve_image_attachments(&self, message: &Message) -> Vec<relay_llm::ContentPart> {
        message
            .attachments
            .iter()
            .filter(|a| a.kind == AttachmentKind::Images)
            .map(|a| self.image_resolver.resolve(a))
            .collect()
    }

    pub async fn stop_streaming(&self, session_id: &str) {
        if let Some(flag) = self.stop_flags.get(session_id) {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(agent) = self.default_agent.read().await.as_ref() {
            agent.stop().await;
        }
    }

    // ---- session CRUD ------------------------------------------------------

    pub async fn create_session(&self, name: Option<String>) -> KernelResult<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.persister.touch_session(&session_id).await?;
        if let Some(name) = name {
            self.update_session(&session_id, &name).await?;
        }
        Ok(session_id)
    }

    pub async fn update_session(&self, session_id: &str, name: &str) -> KernelResult<()> {
        let path = persister::meta_path(&self.workspace_root, session_id);
        let payload = json!({"id": session_id, "name": name});
        tokio::fs::write(&path, serde_json::to_vec_pretty(&payload)?).await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> KernelResult<()> {
        self.persister.delete_session(session_id).await?;
        self.broadcasters.remove(session_id);
        self.stop_flags.remove(session_id);
        Ok(())
    }

    pub async fn get_sessions(&self) -> KernelResult<Vec<SessionSummary>> {
        let dir = self.workspace_root.join("chat_history");
        let mut summaries = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(summaries),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Some(session_id) = file_name.strip_suffix(".jsonl") else { continue };

            let messages = persister::read_session(&self.workspace_root, session_id).await?;
            let name = tokio::fs::read_to_string(persister::meta_path(&self.workspace_root, session_id))
                .await
                .ok()
                .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
                .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string));

            summaries.push(SessionSummary {
                id: session_id.to_string(),
                name,
                message_count: messages.len(),
                last_timestamp: messages.last().map(|m| m.timestamp),
            });
        }
        Ok(summaries)
    }

    pub async fn get_message_history(&self, session_id: Option<&str>, limit: usize, offset: usize) -> KernelResult<Vec<Message>> {
        let mut all = match session_id {
            Some(id) => persister::read_session(&self.workspace_root, id).await?,
            None => {
                let mut combined = Vec::new();
                for summary in self.get_sessions().await? {
                    combined.extend(persister::read_session(&self.workspace_root, &summary.id).await?);
                }
                combined
            }
        };
        all.sort_by_key(|m| m.timestamp);
        let start = offset.min(all.len());
        let end = (offset + limit).min(all.len());
        Ok(all[start..end].to_vec())
    }
}

fn flush_interval_ms() -> u64 {
    std::env::var("CHAT_STORE_FLUSH_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(250)
}

/// Recomputes each attachment's [`AttachmentKind`] bucket from its mime
/// type rather than trusting whatever the client claimed, so a
/// mislabeled upload still lands in the right bucket for downstream
/// resolution (e.g. image content reaching [`ImageResolver`]).
fn normalize_attachments(attachments: Vec<Attachment>) -> Vec<Attachment> {
    attachments
        .into_iter()
        .map(|mut a| {
            a.kind = Attachment::kind_for_mime(&a.mime_type);
            a
        })
        .collect()
}

fn render_transcript(history: &[Message], current_turn: &Message) -> String {
    let mut out = String::new();
    for msg in history {
        let role = match msg.sender {
            Sender::User => "user",
            Sender::Ai => "assistant",
            Sender::System => "system",
        };
        if msg.kind != MessageKind::Message {
            continue;
        }
        out.push_str(role);
        out.push_str(": ");
        out.push_str(&msg.content);
        out.push('\n');
    }
    out.push_str("user: ");
    out.push_str(&current_turn.content);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::{AgentConfig, AgentSession};
    use relay_llm::{OpenAiAdapter, OpenAiConfig};
    use tempfile::tempdir;

    async fn ready_default_agent() -> Arc<AgentSession> {
        let adapter = Arc::new(OpenAiAdapter::new(OpenAiConfig::from_env("gpt-4o")));
        let session = Arc::new(AgentSession::new("writer", AgentConfig::new("writer", "openai", "gpt-4o"), adapter));
        session.initialize().await;
        session
    }

    #[test]
    fn normalize_attachments_recomputes_kind_from_mime_type() {
        let attachments = vec![Attachment {
            id: "att-1".into(),
            filename: "pic.png".into(),
            mime_type: "image/png".into(),
            size_bytes: 4,
            relative_path: "pic.png".into(),
            absolute_path: None,
            kind: AttachmentKind::Files,
            url: None,
        }];
        let normalized = normalize_attachments(attachments);
        assert_eq!(normalized[0].kind, AttachmentKind::Images);
    }

    #[tokio::test]
    async fn dispatch_resolves_image_attachments_for_default_agent() {
        let dir = tempdir().unwrap();
        let service = ChatService::new(dir.path());
        service.set_default_agent(ready_default_agent().await).await;

        let attachment = Attachment {
            id: "att-1".into(),
            filename: "pic.png".into(),
            mime_type: "image/png".into(),
            size_bytes: 4,
            relative_path: "pic.png".into(),
            absolute_path: None,
            kind: AttachmentKind::Images,
            url: None,
        };
        let current_turn = Message::user("sess-1", "what is this?").with_attachments(vec![attachment]);
        let images = service.resolve_image_attachments(&current_turn);
        assert_eq!(images.len(), 1);
        match &images[0] {
            relay_llm::ContentPart::ImageUrl { url } => assert!(url.contains("att-1")),
            _ => panic!("expected an image url part"),
        }
        service.shutdown().await;
    }

    #[tokio::test]
    async fn user_message_is_persisted_and_broadcast() {
        let dir = tempdir().unwrap();
        let service = ChatService::new(dir.path());
        service.set_default_agent(ready_default_agent().await).await;

        let mut rx = service.bind_connection("conn-1", "sess-1").await;
        let message_id = service.handle_user_message("conn-1", "hello there".to_string(), InboundMetadata::default()).await.unwrap();
        assert!(!message_id.is_empty());

        // First broadcast frame is the persisted user message.
        let first = rx.recv().await.unwrap();
        assert_eq!(first["type"], "message");

        service.shutdown().await;
        let history = service.get_message_history(Some("sess-1"), 100, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello there");
        assert!(history[1].metadata.get("streaming_complete").and_then(|v| v.as_bool()).unwrap_or(false));
    }

    #[tokio::test]
    async fn ai_message_is_never_broadcast_only_the_stream_frames_are() {
        let dir = tempdir().unwrap();
        let service = ChatService::new(dir.path());
        service.set_default_agent(ready_default_agent().await).await;

        let mut rx = service.bind_connection("conn-1", "sess-1").await;
        service.handle_user_message("conn-1", "hi".to_string(), InboundMetadata::default()).await.unwrap();

        let mut saw_final_ai_message_frame = false;
        while let Ok(frame) = rx.try_recv() {
            if frame["type"] == "message" && frame["message"]["sender"] == "ai" {
                saw_final_ai_message_frame = true;
            }
        }
        assert!(!saw_final_ai_message_frame);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn session_crud_round_trips() {
        let dir = tempdir().unwrap();
        let service = ChatService::new(dir.path());
        let session_id = service.create_session(Some("My Chat".to_string())).await.unwrap();

        let sessions = service.get_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name.as_deref(), Some("My Chat"));

        service.update_session(&session_id, "Renamed").await.unwrap();
        let sessions = service.get_sessions().await.unwrap();
        assert_eq!(sessions[0].name.as_deref(), Some("Renamed"));

        service.delete_session(&session_id).await.unwrap();
        assert!(service.get_sessions().await.unwrap().is_empty());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn history_pagination_applies_offset_and_limit() {
        let dir = tempdir().unwrap();
        let service = ChatService::new(dir.path());
        service.persister.enqueue(Message::user("s1", "one"));
        service.persister.enqueue(Message::user("s1", "two"));
        service.persister.enqueue(Message::user("s1", "three"));
        service.persister.flush_all().await.unwrap();

        let page = service.get_message_history(Some("s1"), 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "two");
        service.shutdown().await;
    }
}
