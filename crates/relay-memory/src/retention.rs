//! Session-level retention policies: on insertion, cap a session's
//! memory to `max_context_length` by deleting the lowest-priority
//! entries under one of three orderings.

use crate::entry::MemoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Evict the oldest entries by insertion timestamp.
    Fifo,
    /// Evict the lowest-`importance` entries first.
    Importance,
    /// Evict the least-recently-accessed entries first.
    Recency,
}

/// Given `entries` (all belonging to one session) and a cap, returns the
/// indices to evict so the session holds at most `max_context_length`
/// entries, worst-priority first.
pub fn entries_to_evict(entries: &[MemoryEntry], max_context_length: usize, policy: RetentionPolicy) -> Vec<usize> {
    if entries.len() <= max_context_length {
        return Vec::new();
    }
    let overflow = entries.len() - max_context_length;

    let mut ranked: Vec<usize> = (0..entries.len()).collect();
    match policy {
        RetentionPolicy::Fifo => ranked.sort_by_key(|&i| entries[i].timestamp),
        RetentionPolicy::Importance => {
            ranked.sort_by(|&a, &b| entries[a].importance.total_cmp(&entries[b].importance))
        }
        RetentionPolicy::Recency => ranked.sort_by_key(|&i| entries[i].last_accessed),
    }

    ranked.into_iter().take(overflow).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MemoryKind;

    fn entry_with(importance: f32, timestamp: i64, last_accessed: i64) -> MemoryEntry {
        let mut e = MemoryEntry::new("a", "s", MemoryKind::Episodic, "x", importance);
        e.timestamp = timestamp;
        e.last_accessed = last_accessed;
        e
    }

    #[test]
    fn fifo_evicts_oldest_first() {
        let entries = vec![entry_with(0.5, 100, 100), entry_with(0.5, 50, 50), entry_with(0.5, 150, 150)];
        let evicted = entries_to_evict(&entries, 2, RetentionPolicy::Fifo);
        assert_eq!(evicted, vec![1]);
    }

    #[test]
    fn importance_evicts_lowest_first() {
        let entries = vec![entry_with(0.9, 1, 1), entry_with(0.1, 2, 2), entry_with(0.5, 3, 3)];
        let evicted = entries_to_evict(&entries, 2, RetentionPolicy::Importance);
        assert_eq!(evicted, vec![1]);
    }

    #[test]
    fn recency_evicts_least_recently_accessed() {
        let entries = vec![entry_with(0.5, 1, 500), entry_with(0.5, 2, 100), entry_with(0.5, 3, 900)];
        let evicted = entries_to_evict(&entries, 2, RetentionPolicy::Recency);
        assert_eq!(evicted, vec![1]);
    }

    #[test]
    fn no_eviction_when_within_cap() {
        let entries = vec![entry_with(0.5, 1, 1), entry_with(0.5, 2, 2)];
        assert!(entries_to_evict(&entries, 5, RetentionPolicy::Fifo).is_empty());
    }
}
