//! `WorkflowConfig` — the static definition of a workflow run: its
//! name, task list, and scheduling/persistence knobs.

use crate::task::WorkflowTask;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    pub tasks: Vec<WorkflowTask>,
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,
    #[serde(default)]
    pub auto_save: bool,
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default)]
    pub global_timeout_secs: Option<u64>,
}

fn default_parallel_limit() -> usize {
    5
}

impl WorkflowConfig {
    pub fn new(name: impl Into<String>, tasks: Vec<WorkflowTask>) -> Self {
        Self {
            name: name.into(),
            tasks,
            parallel_limit: default_parallel_limit(),
            auto_save: false,
            save_path: None,
            global_timeout_secs: None,
        }
    }
}
