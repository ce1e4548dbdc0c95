//! `WorkflowTask` and its type tag.

use std::collections::HashMap;

use relay_agent::AgentConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a task participates in wave scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Sequential,
    Parallel,
    Conditional,
    /// Hands control to a specific agent synchronously; scheduled like
    /// `Sequential` (one at a time, in enumeration order).
    Handoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub agent_config: Option<AgentConfig>,
    pub task_content: String,
    /// Each entry references a prior task by id OR by name; the engine
    /// normalizes names to ids during validation.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Supported keys: `task_result:<id>` (equality check against a prior
    /// result) and `task_status:<id>` (must be in `completed`).
    #[serde(default)]
    pub conditions: HashMap<String, Value>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub retry_count: u32,
}

fn default_max_retries() -> u32 {
    0
}

impl WorkflowTask {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: TaskKind, task_content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            agent_config: None,
            task_content: task_content.into(),
            dependencies: Vec::new(),
            conditions: HashMap::new(),
            timeout_secs: None,
            max_retries: default_max_retries(),
            retry_count: 0,
        }
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_conditions(mut self, conditions: HashMap<String, Value>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_agent_config(mut self, config: AgentConfig) -> Self {
        self.agent_config = Some(config);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
