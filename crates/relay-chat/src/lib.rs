//! Chat service: session-scoped streaming, JSONL persistence with a
//! buffered flusher, session CRUD, and history retrieval.

pub mod agent_source;
pub mod batching;
pub mod frame;
pub mod persister;
pub mod service;

pub use agent_source::{BoxAgentStream, CustomAgent};
pub use batching::{BatchingConfig, ChunkBatcher};
pub use frame::{ClientFrame, InboundMetadata, ServerFrame, StreamEvent};
pub use persister::ChatPersister;
pub use service::{ChatService, SessionSummary};
