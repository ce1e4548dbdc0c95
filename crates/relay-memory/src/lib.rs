//! Context manager: agent memory storage with session scoping, a
//! retention policy applied on insertion, and cross-agent sharing (spec
//! §4.8).

pub mod entry;
pub mod retention;
pub mod store;

pub use entry::{MemoryEntry, MemoryKind};
pub use retention::{entries_to_evict, RetentionPolicy};
pub use store::MemoryStore;
