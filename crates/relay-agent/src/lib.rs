//! Agent lifecycle state machine, capability set, and streaming task
//! execution.

pub mod capability;
pub mod config;
pub mod message;
pub mod session;
pub mod status;

pub use capability::{Capability, CapabilityInstance, CapabilityInvoker, CapabilityRegistry, CapabilitySet};
pub use config::AgentConfig;
pub use message::{AgentMessage, AgentMessageKind};
pub use session::{AgentMetrics, AgentSession};
pub use status::Status;
