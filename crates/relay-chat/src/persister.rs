//! The buffered JSONL persister: messages are enqueued into a
//! per-session in-memory list under a mutex; a periodic flusher appends
//! each dirty session's buffer to its file in one write.
//! Flush-on-shutdown is synchronous and deterministic: no best-effort
//! cancellation race, callers must await it directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use relay_kernel::{KernelResult, Message};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

fn history_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join("chat_history")
}

pub fn jsonl_path(workspace_root: &Path, session_id: &str) -> PathBuf {
    history_dir(workspace_root).join(format!("{session_id}.jsonl"))
}

pub fn meta_path(workspace_root: &Path, session_id: &str) -> PathBuf {
    history_dir(workspace_root).join(format!("{session_id}.meta.json"))
}

/// Reads every `Message` from a session's JSONL file. A missing file
/// reads as empty; malformed lines are skipped rather than failing the
/// whole read.
pub async fn read_session(workspace_root: &Path, session_id: &str) -> KernelResult<Vec<Message>> {
    let path = jsonl_path(workspace_root, session_id);
    let Ok(raw) = tokio::fs::read_to_string(&path).await else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(line) {
            Ok(msg) => out.push(msg),
            Err(e) => warn!(session_id, error = %e, "skipping malformed chat history line"),
        }
    }
    Ok(out)
}

pub struct ChatPersister {
    workspace_root: PathBuf,
    pending: DashMap<String, Mutex<Vec<Message>>>,
}

impl ChatPersister {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self { workspace_root: workspace_root.into(), pending: DashMap::new() }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Queues `message` for the next flush. Does not touch disk.
    pub fn enqueue(&self, message: Message) {
        self.pending.entry(message.session_id.clone()).or_insert_with(|| Mutex::new(Vec::new())).lock().push(message);
    }

    /// Creates an empty JSONL file for `session_id` if it does not
    /// already exist, so newly created sessions are visible to
    /// `get_sessions` before any message arrives.
    pub async fn touch_session(&self, session_id: &str) -> KernelResult<()> {
        tokio::fs::create_dir_all(history_dir(&self.workspace_root)).await?;
        let path = jsonl_path(&self.workspace_root, session_id);
        if tokio::fs::metadata(&path).await.is_err() {
            tokio::fs::write(&path, b"").await?;
        }
        Ok(())
    }

    /// Appends every queued message for every dirty session to its file,
    /// then clears the in-memory buffers. Awaited directly (never
    /// fire-and-forget) so shutdown can call this synchronously.
    pub async fn flush_all(&self) -> KernelResult<()> {
        tokio::fs::create_dir_all(history_dir(&self.workspace_root)).await?;
        for entry in self.pending.iter() {
            let session_id = entry.key().clone();
            let batch: Vec<Message> = {
                let mut guard = entry.value().lock();
                if guard.is_empty() {
                    continue;
                }
                std::mem::take(&mut *guard)
            };
            let mut payload = String::new();
            for msg in &batch {
                payload.push_str(&serde_json::to_string(msg)?);
                payload.push('\n');
            }
            let path = jsonl_path(&self.workspace_root, &session_id);
            let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await?;
            file.write_all(payload.as_bytes()).await?;
            debug!(session_id, count = batch.len(), "flushed chat messages");
        }
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> KernelResult<()> {
        self.pending.remove(session_id);
        let _ = tokio::fs::remove_file(jsonl_path(&self.workspace_root, session_id)).await;
        let _ = tokio::fs::remove_file(meta_path(&self.workspace_root, session_id)).await;
        Ok(())
    }

    /// Spawns the periodic flusher. The returned handle is aborted by
    /// the caller (typically at shutdown, after a final `flush_all`).
    pub fn spawn_flusher(self: &Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = this.flush_all().await {
                    warn!(error = %e, "periodic chat flush failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_kernel::Message;
    use tempfile::tempdir;

    #[tokio::test]
    async fn enqueue_then_flush_writes_jsonl_in_order() {
        let dir = tempdir().unwrap();
        let persister = ChatPersister::new(dir.path());
        persister.enqueue(Message::user("s1", "first"));
        persister.enqueue(Message::user("s1", "second"));
        persister.flush_all().await.unwrap();

        let messages = read_session(dir.path(), "s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
    }

    #[tokio::test]
    async fn flush_is_idempotent_when_nothing_pending() {
        let dir = tempdir().unwrap();
        let persister = ChatPersister::new(dir.path());
        persister.flush_all().await.unwrap();
        persister.flush_all().await.unwrap();
        assert!(read_session(dir.path(), "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_session_removes_file() {
        let dir = tempdir().unwrap();
        let persister = ChatPersister::new(dir.path());
        persister.enqueue(Message::user("s1", "hi"));
        persister.flush_all().await.unwrap();
        persister.delete_session("s1").await.unwrap();
        assert!(read_session(dir.path(), "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn touch_session_creates_empty_file() {
        let dir = tempdir().unwrap();
        let persister = ChatPersister::new(dir.path());
        persister.touch_session("new-session").await.unwrap();
        assert!(jsonl_path(dir.path(), "new-session").exists());
    }
}
