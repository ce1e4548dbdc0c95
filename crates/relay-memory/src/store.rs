//! `MemoryStore` — the context manager: indexes entries by session and
//! agent, applies a retention policy on insertion, and supports
//! cutoff-based expiry.

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::entry::MemoryEntry;
use crate::retention::{entries_to_evict, RetentionPolicy};

pub struct MemoryStore {
    by_session: DashMap<String, RwLock<Vec<MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { by_session: DashMap::new() }
    }

    /// Inserts `entry` into its session's memory, then applies `policy`
    /// to cap the session to `max_context_length` entries.
    pub fn insert(&self, entry: MemoryEntry, max_context_length: usize, policy: RetentionPolicy) {
        let session_id = entry.session_id.clone();
        let bucket = self.by_session.entry(session_id).or_insert_with(|| RwLock::new(Vec::new()));
        let mut entries = bucket.write();
        entries.push(entry);

        let evict = entries_to_evict(&entries, max_context_length, policy);
        if !evict.is_empty() {
            let mut evict_set: Vec<usize> = evict;
            evict_set.sort_unstable();
            for &idx in evict_set.iter().rev() {
                entries.remove(idx);
            }
        }
    }

    pub fn session_entries(&self, session_id: &str) -> Vec<MemoryEntry> {
        self.by_session.get(session_id).map(|b| b.read().clone()).unwrap_or_default()
    }

    /// Entries anywhere visible to `agent_id` (owned, or shared with it),
    /// scoped to one session.
    pub fn entries_for_agent(&self, session_id: &str, agent_id: &str) -> Vec<MemoryEntry> {
        self.session_entries(session_id).into_iter().filter(|e| e.visible_to(agent_id)).collect()
    }

    /// Deletes every entry across every session whose `timestamp` predates
    /// `now_millis - retention_days`. Returns the number removed.
    pub fn cleanup_expired(&self, retention_days: i64, now_millis: i64) -> usize {
        let cutoff = now_millis - retention_days * 24 * 60 * 60 * 1000;
        let mut removed = 0;
        for bucket in self.by_session.iter() {
            let mut entries = bucket.value().write();
            let before = entries.len();
            entries.retain(|e| e.timestamp >= cutoff);
            removed += before - entries.len();
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.by_session.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
