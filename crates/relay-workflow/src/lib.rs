//! DAG workflow engine: validates a task graph, runs it wave by wave
//! with separate sequential and parallel ready queues, retries failed
//! tasks with exponential backoff, and persists state when configured
//! to.

pub mod config;
pub mod dag;
pub mod engine;
pub mod events;
pub mod runner;
pub mod state;
pub mod task;

pub use config::WorkflowConfig;
pub use engine::WorkflowEngine;
pub use runner::{AgentRunner, DefaultAgentRunner};
pub use state::{WorkflowState, WorkflowStatus};
pub use task::{TaskKind, WorkflowTask};
