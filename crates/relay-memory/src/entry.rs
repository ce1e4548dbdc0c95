//! `MemoryEntry` — one record in the context manager's store (spec
//! §4.8).

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Episodic,
    Semantic,
    Procedural,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub kind: MemoryKind,
    pub agent_id: String,
    pub session_id: String,
    pub importance: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub access_count: u64,
    pub last_accessed: i64,
    /// Agent ids (besides `agent_id`) this entry is visible to, for
    /// shared-context memories.
    #[serde(default)]
    pub shared_with: Vec<String>,
}

impl MemoryEntry {
    pub fn new(agent_id: impl Into<String>, session_id: impl Into<String>, kind: MemoryKind, content: impl Into<String>, importance: f32) -> Self {
        let now = relay_kernel::message::now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            kind,
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            importance,
            timestamp: now,
            access_count: 0,
            last_accessed: now,
            shared_with: Vec::new(),
        }
    }

    pub fn shared_with(mut self, agent_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.shared_with = agent_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn visible_to(&self, agent_id: &str) -> bool {
        self.agent_id == agent_id || self.shared_with.iter().any(|a| a == agent_id)
    }

    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = relay_kernel::message::now_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_bumps_access_count() {
        let mut entry = MemoryEntry::new("agent-1", "sess-1", MemoryKind::Episodic, "saw a cat", 0.5);
        assert_eq!(entry.access_count, 0);
        entry.touch();
        entry.touch();
        assert_eq!(entry.access_count, 2);
    }

    #[test]
    fn visibility_includes_owner_and_shared_list() {
        let entry = MemoryEntry::new("agent-1", "sess-1", MemoryKind::Semantic, "fact", 0.5).shared_with(["agent-2"]);
        assert!(entry.visible_to("agent-1"));
        assert!(entry.visible_to("agent-2"));
        assert!(!entry.visible_to("agent-3"));
    }
}
