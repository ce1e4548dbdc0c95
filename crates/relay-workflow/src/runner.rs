//! The workflow engine's view of "an agent": obtain or create one per
//! task, run a turn of text to completion, and allow owned agents to be
//! paused, resumed, or stopped as a group.
//!
//! Kept as a trait rather than a hard dependency on one provider so the
//! scheduler stays agnostic to framework choice: an explicit small
//! factory picks the concrete adapter, not a runtime string-keyed
//! lookup.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use relay_agent::{AgentConfig, AgentSession};
use relay_kernel::{KernelError, KernelResult};
use relay_llm::{FrameworkAdapter, OpenAiAdapter, OpenAiConfig};

#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Runs `task_content` to completion through the agent described by
    /// `agent_config` (or a default agent if absent), returning the
    /// concatenation of its text output.
    async fn run_task(&self, task_id: &str, agent_config: Option<&AgentConfig>, task_content: &str) -> KernelResult<String>;

    /// Pauses every agent this runner currently owns. No-op by default.
    async fn pause_all(&self) {}

    /// Resumes every agent this runner currently owns. No-op by default.
    async fn resume_all(&self) {}

    /// Stops every agent this runner currently owns. No-op by default.
    async fn stop_all(&self) {}
}

fn build_adapter(config: &AgentConfig) -> Arc<dyn FrameworkAdapter> {
    match config.framework.as_str() {
        // Every framework tag currently maps to the OpenAI-compatible
        // adapter; unknown tags still resolve here rather than failing,
        // since model selection (not framework routing) differentiates
        // providers at present.
        _ => Arc::new(OpenAiAdapter::new(OpenAiConfig::from_env(config.model.clone()))),
    }
}

/// Creates a fresh [`AgentSession`] per task, using the OpenAI-compatible
/// adapter for every configured framework (the factory has one concrete
/// branch today, pending additional providers). Keeps sessions
/// reachable by task id so `pause_all`/`resume_all`/`stop_all` can reach
/// in-flight work.
pub struct DefaultAgentRunner {
    default_config: AgentConfig,
    active: DashMap<String, Arc<AgentSession>>,
}

impl DefaultAgentRunner {
    pub fn new(default_config: AgentConfig) -> Self {
        Self { default_config, active: DashMap::new() }
    }
}

#[async_trait]
impl AgentRunner for DefaultAgentRunner {
    async fn run_task(&self, task_id: &str, agent_config: Option<&AgentConfig>, task_content: &str) -> KernelResult<String> {
        let config = agent_config.cloned().unwrap_or_else(|| self.default_config.clone());
        let adapter = build_adapter(&config);
        let session = Arc::new(AgentSession::new(config.name.clone(), config, adapter));
        session.initialize().await;
        if session.status() != relay_agent::Status::Ready {
            return Err(KernelError::internal(format!("agent for task '{task_id}' failed to initialize")));
        }

        self.active.insert(task_id.to_string(), session.clone());
        let mut stream = session.execute(task_content.to_string(), None);
        let mut text = String::new();
        let mut error: Option<String> = None;
        while let Some(msg) = stream.next().await {
            match msg.kind {
                relay_agent::AgentMessageKind::Text => text.push_str(&msg.content),
                relay_agent::AgentMessageKind::Error => error = Some(msg.content),
                _ => {}
            }
        }
        self.active.remove(task_id);

        match error {
            Some(message) => Err(KernelError::internal(message)),
            None => Ok(text),
        }
    }

    async fn pause_all(&self) {
        for entry in self.active.iter() {
            entry.value().pause();
        }
    }

    async fn resume_all(&self) {
        for entry in self.active.iter() {
            entry.value().resume();
        }
    }

    async fn stop_all(&self) {
        for entry in self.active.iter() {
            entry.value().stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_runner_executes_simulated_task() {
        // No OPENAI_API_KEY in the test environment, so this runs the
        // adapter's deterministic simulated path.
        let runner = DefaultAgentRunner::new(AgentConfig::new("writer", "openai", "gpt-4o"));
        let result = runner.run_task("t1", None, "summarize the quarter").await.unwrap();
        assert!(!result.is_empty());
    }
}
