//! `AgentConfig` — the value object an [`crate::session::AgentSession`] is
//! created from.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub framework: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub capabilities: HashSet<String>,
    #[serde(default)]
    pub memory_enabled: bool,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default)]
    pub custom_config: HashMap<String, serde_json::Value>,
}

fn default_context_window() -> usize {
    8192
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, framework: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            framework: framework.into(),
            role: String::new(),
            goal: String::new(),
            backstory: String::new(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            capabilities: HashSet::new(),
            memory_enabled: false,
            context_window: default_context_window(),
            custom_config: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = AgentConfig::new("writer", "openai", "gpt-4o");
        assert_eq!(config.context_window, 8192);
        assert!(!config.memory_enabled);
        assert!(config.capabilities.is_empty());
    }
}
