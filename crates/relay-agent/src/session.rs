//! `AgentSession` — an agent instance: config, status, capability set,
//! and a streaming adapter. Each call to `execute` returns a
//! receive-only channel of [`AgentMessage`], fed by a spawned task that
//! drives the adapter and observes cooperative cancellation at every
//! chunk boundary.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use relay_llm::{ContentPart, FrameworkAdapter, Prompt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use crate::capability::CapabilitySet;
use crate::config::AgentConfig;
use crate::message::AgentMessage;
use crate::status::Status;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
pub struct AgentMetrics {
    pub total_runs: AtomicU64,
    pub total_errors: AtomicU64,
}

pub struct AgentSession {
    pub session_id: String,
    pub agent_id: String,
    pub config: AgentConfig,
    pub created_at: i64,
    status: RwLock<Status>,
    capabilities: Mutex<CapabilitySet>,
    contexts: Mutex<Vec<serde_json::Value>>,
    last_activity: AtomicI64,
    metrics: AgentMetrics,
    adapter: Arc<dyn FrameworkAdapter>,
    stop_requested: Arc<AtomicBool>,
}

impl AgentSession {
    pub fn new(agent_id: impl Into<String>, config: AgentConfig, adapter: Arc<dyn FrameworkAdapter>) -> Self {
        let now = relay_kernel::message::now_millis();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            config,
            created_at: now,
            status: RwLock::new(Status::Created),
            capabilities: Mutex::new(CapabilitySet::new()),
            contexts: Mutex::new(Vec::new()),
            last_activity: AtomicI64::new(now),
            metrics: AgentMetrics::default(),
            adapter,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn status(&self) -> Status {
        *self.status.read()
    }

    pub fn capabilities(&self) -> &Mutex<CapabilitySet> {
        &self.capabilities
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    /// Forces `next` if legal, logging and leaving status unchanged
    /// otherwise. Illegal transitions are a programming error inside this
    /// crate, not a caller-facing failure, so this never returns a Result.
    fn transition(&self, next: Status) {
        let mut guard = self.status.write();
        if guard.can_transition_to(next) {
            debug!(agent_id = %self.agent_id, from = ?*guard, to = ?next, "agent status transition");
            *guard = next;
        } else {
            warn!(agent_id = %self.agent_id, from = ?*guard, to = ?next, "rejected illegal agent status transition");
        }
    }

    /// Drives initialization: `CREATED -> INITIALIZING -> READY` (or
    /// `ERROR` if the adapter fails to initialize).
    pub async fn initialize(&self) {
        self.transition(Status::Initializing);
        match self.adapter.initialize().await {
            Ok(_) => self.transition(Status::Ready),
            Err(e) => {
                error!(agent_id = %self.agent_id, error = %e, "adapter initialization failed");
                self.transition(Status::Error);
            }
        }
    }

    pub fn pause(&self) -> bool {
        let status = self.status();
        if matches!(status, Status::Running | Status::Ready) {
            self.transition(Status::Paused);
            true
        } else {
            false
        }
    }

    pub fn resume(&self) -> bool {
        if self.status() == Status::Paused {
            self.transition(Status::Ready);
            true
        } else {
            false
        }
    }

    pub fn destroy(&self) {
        self.transition(Status::Destroyed);
    }

    /// Cooperative stop: flips the shared flag the execution loop polls,
    /// asks the adapter to stop, and transitions through
    /// `STOPPING -> STOPPED`.
    pub async fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.adapter.stop().await;
        if matches!(self.status(), Status::Running | Status::Ready) {
            self.transition(Status::Stopping);
            self.transition(Status::Stopped);
        }
    }

    /// Runs `task` through the adapter, returning a receive-only stream of
    /// [`AgentMessage`]. If status does not accept tasks, the stream
    /// yields a single error item and closes immediately.
    pub fn execute(self: &Arc<Self>, task: String, context: Option<serde_json::Value>) -> ReceiverStream<AgentMessage> {
        self.execute_multimodal(task, Vec::new(), context)
    }

    /// Like [`Self::execute`], but reconstructs the user turn as
    /// multimodal content when `images` is non-empty (see
    /// [`Prompt::push_user_multimodal`]), rather than flattening it into
    /// text.
    pub fn execute_multimodal(
        self: &Arc<Self>,
        task: String,
        images: Vec<ContentPart>,
        context: Option<serde_json::Value>,
    ) -> ReceiverStream<AgentMessage> {
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

        if !self.status().accepts_tasks() {
            let agent_id = self.agent_id.clone();
            let _ = tx.try_send(AgentMessage::error(agent_id, "agent is not in a state that accepts tasks"));
            return ReceiverStream::new(rx);
        }

        if let Some(ctx) = context.clone() {
            self.contexts.lock().push(ctx);
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.run_to_channel(task, images, context, tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn run_to_channel(
        self: Arc<Self>,
        task: String,
        images: Vec<ContentPart>,
        context: Option<serde_json::Value>,
        tx: tokio::sync::mpsc::Sender<AgentMessage>,
    ) {
        self.transition(Status::Running);
        self.last_activity.store(relay_kernel::message::now_millis(), Ordering::SeqCst);
        self.metrics.total_runs.fetch_add(1, Ordering::Relaxed);
        self.stop_requested.store(false, Ordering::SeqCst);

        let prompt = Prompt::new().push_user_multimodal(task, images);

        let mut stream = match self.adapter.run_streaming(&prompt, context.as_ref()).await {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
                let _ = tx.send(AgentMessage::error(self.agent_id.clone(), e.to_string())).await;
                self.transition(Status::Error);
                return;
            }
        };

        use futures::StreamExt;
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                self.transition(Status::Stopping);
                self.transition(Status::Stopped);
                return;
            }

            match stream.next().await {
                None => break,
                Some(Ok(chunk)) => {
                    if !chunk.delta.is_empty() {
                        if tx.send(AgentMessage::text(self.agent_id.clone(), chunk.delta)).await.is_err() {
                            return;
                        }
                    }
                    if chunk.is_done() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    self.metrics.total_errors.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(AgentMessage::error(self.agent_id.clone(), e.to_string())).await;
                    self.transition(Status::Error);
                    return;
                }
            }
        }

        self.transition(Status::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use relay_llm::{OpenAiAdapter, OpenAiConfig};

    fn session() -> Arc<AgentSession> {
        let adapter = Arc::new(OpenAiAdapter::new(OpenAiConfig {
            api_key: None,
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
        }));
        Arc::new(AgentSession::new("agent-1", AgentConfig::new("writer", "openai", "gpt-4o"), adapter))
    }

    #[tokio::test]
    async fn execute_before_ready_emits_single_error() {
        let session = session();
        let mut stream = session.execute("hello".into(), None);
        let first = stream.next().await.unwrap();
        assert_eq!(first.kind, crate::message::AgentMessageKind::Error);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn ready_agent_streams_text_then_returns_to_ready() {
        let session = session();
        session.initialize().await;
        assert_eq!(session.status(), Status::Ready);

        let mut stream = session.execute("say hi".into(), None);
        let mut saw_text = false;
        while let Some(msg) = stream.next().await {
            if msg.kind == crate::message::AgentMessageKind::Text {
                saw_text = true;
            }
        }
        assert!(saw_text);
        assert_eq!(session.status(), Status::Ready);
    }

    #[tokio::test]
    async fn execute_multimodal_with_images_still_streams_text() {
        let session = session();
        session.initialize().await;

        let images = vec![ContentPart::ImageUrl { url: "https://example.com/pic.png".into() }];
        let mut stream = session.execute_multimodal("describe this".into(), images, None);
        let mut saw_text = false;
        while let Some(msg) = stream.next().await {
            if msg.kind == crate::message::AgentMessageKind::Text {
                saw_text = true;
            }
        }
        assert!(saw_text);
        assert_eq!(session.status(), Status::Ready);
    }

    #[tokio::test]
    async fn stop_transitions_through_stopping_to_stopped() {
        let session = session();
        session.initialize().await;
        session.stop().await;
        assert_eq!(session.status(), Status::Stopped);
    }

    #[tokio::test]
    async fn pause_then_resume_returns_to_ready() {
        let session = session();
        session.initialize().await;
        assert!(session.pause());
        assert_eq!(session.status(), Status::Paused);
        assert!(session.resume());
        assert_eq!(session.status(), Status::Ready);
    }
}
