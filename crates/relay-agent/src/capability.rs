//! Capabilities attached to an agent: a named descriptor plus an
//! invoker, installed per-agent with its own configuration and
//! usage counter. Unlike the global [`relay_tools::ToolRegistry`], a
//! capability set is scoped to one agent and enforces at most one
//! instance per name.
//!
//! [`CapabilityRegistry`] is the cross-agent dispatch surface: it maps
//! an agent id to the live [`AgentSession`] that owns its capability
//! set, so `execute_capability(agent_id, name, params)` can validate
//! `params` against the capability's schema, invoke it, and bump the
//! usage counter in one call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::session::AgentSession;

/// Executes one capability's side effect once its parameters have passed
/// schema validation. Mirrors `relay_tools::Tool::invoke`'s contract: a
/// capability-level failure is reported as `Err`, never a panic.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    async fn invoke(&self, params: Value) -> Result<Value, String>;
}

/// A capability descriptor, analogous to a [`relay_tools::Tool`] but
/// scoped to the frameworks that can invoke it. Carries the invoker that
/// performs its side effect.
#[derive(Clone)]
pub struct Capability {
    pub name: String,
    pub category: String,
    pub parameters_schema: Value,
    pub required_frameworks: Vec<String>,
    invoker: Arc<dyn CapabilityInvoker>,
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("parameters_schema", &self.parameters_schema)
            .field("required_frameworks", &self.required_frameworks)
            .finish_non_exhaustive()
    }
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        parameters_schema: Value,
        invoker: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            parameters_schema,
            required_frameworks: Vec::new(),
            invoker,
        }
    }

    pub fn for_frameworks(mut self, frameworks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_frameworks = frameworks.into_iter().map(Into::into).collect();
        self
    }

    pub fn supports_framework(&self, framework: &str) -> bool {
        self.required_frameworks.is_empty() || self.required_frameworks.iter().any(|f| f == framework)
    }

    pub fn invoker(&self) -> Arc<dyn CapabilityInvoker> {
        self.invoker.clone()
    }
}

/// A capability attached to one specific agent, with its own config
/// overrides and a dispatch counter.
pub struct CapabilityInstance {
    pub capability: Capability,
    pub config: Value,
    usage_count: AtomicU64,
}

impl CapabilityInstance {
    fn new(capability: Capability, config: Value) -> Self {
        Self { capability, config, usage_count: AtomicU64::new(0) }
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    fn record_use(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// The set of capabilities attached to one agent. Enforces "a capability
/// name appears at most once per agent".
#[derive(Default)]
pub struct CapabilitySet {
    instances: HashMap<String, CapabilityInstance>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `capability`, returning an error if the name is already
    /// attached.
    pub fn attach(&mut self, capability: Capability, config: Value) -> Result<(), String> {
        if self.instances.contains_key(&capability.name) {
            return Err(format!("capability '{}' is already attached to this agent", capability.name));
        }
        self.instances.insert(capability.name.clone(), CapabilityInstance::new(capability, config));
        Ok(())
    }

    pub fn detach(&mut self, name: &str) -> bool {
        self.instances.remove(name).is_some()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityInstance> {
        self.instances.get(name)
    }

    /// Marks one dispatch against `name`'s usage counter, failing if the
    /// capability is not attached.
    pub fn record_dispatch(&self, name: &str) -> Result<(), String> {
        match self.instances.get(name) {
            Some(instance) => {
                instance.record_use();
                Ok(())
            }
            None => Err(format!("capability '{name}' is not attached")),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }
}

/// Checks `params` against a JSON-schema-shaped `object` document: every
/// name in `required` must be present, and any property with a declared
/// `type` must match it. Unknown keywords are ignored rather than
/// rejected — this is a pragmatic subset, not a full validator.
pub fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        let Some(params_obj) = params.as_object() else {
            return Err("params must be a JSON object".to_string());
        };
        for key in required {
            let Some(key) = key.as_str() else { continue };
            if !params_obj.contains_key(key) {
                return Err(format!("missing required parameter '{key}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        let params_obj = params.as_object();
        for (key, prop_schema) in properties {
            let Some(value) = params_obj.and_then(|o| o.get(key)) else { continue };
            let Some(expected_type) = prop_schema.get("type").and_then(Value::as_str) else { continue };
            if !json_type_matches(expected_type, value) {
                return Err(format!("parameter '{key}' must be of type '{expected_type}'"));
            }
        }
    }

    Ok(())
}

fn json_type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Cross-agent dispatch surface for capabilities. Maps an agent id to the
/// live session that owns its capability set.
#[derive(Default)]
pub struct CapabilityRegistry {
    agents: DashMap<String, Arc<AgentSession>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent(&self, session: Arc<AgentSession>) {
        self.agents.insert(session.agent_id.clone(), session);
    }

    pub fn unregister_agent(&self, agent_id: &str) -> bool {
        self.agents.remove(agent_id).is_some()
    }

    /// Validates `params` against `name`'s schema, invokes it on
    /// `agent_id`'s capability set, and bumps the usage counter on
    /// success. Schema failures and unknown agent/capability names never
    /// reach the invoker and never touch the counter.
    pub async fn execute_capability(&self, agent_id: &str, name: &str, params: Value) -> Result<Value, String> {
        let session = self
            .agents
            .get(agent_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| format!("agent '{agent_id}' is not registered"))?;

        let (invoker, schema) = {
            let capabilities = session.capabilities().lock();
            let instance = capabilities
                .get(name)
                .ok_or_else(|| format!("capability '{name}' is not attached to agent '{agent_id}'"))?;
            (instance.capability.invoker(), instance.capability.parameters_schema.clone())
        };

        validate_params(&schema, &params)?;

        let result = invoker.invoke(params).await;

        if result.is_ok() {
            let capabilities = session.capabilities().lock();
            let _ = capabilities.record_dispatch(name);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use relay_llm::{OpenAiAdapter, OpenAiConfig};

    struct EchoInvoker;

    #[async_trait]
    impl CapabilityInvoker for EchoInvoker {
        async fn invoke(&self, params: Value) -> Result<Value, String> {
            Ok(params)
        }
    }

    struct FailingInvoker;

    #[async_trait]
    impl CapabilityInvoker for FailingInvoker {
        async fn invoke(&self, _params: Value) -> Result<Value, String> {
            Err("invoker refused".to_string())
        }
    }

    fn echo_capability(name: &str) -> Capability {
        Capability::new(
            name,
            "tool",
            serde_json::json!({"type": "object", "required": ["query"], "properties": {"query": {"type": "string"}}}),
            Arc::new(EchoInvoker),
        )
    }

    fn test_session(agent_id: &str) -> Arc<AgentSession> {
        let adapter = Arc::new(OpenAiAdapter::new(OpenAiConfig {
            api_key: None,
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
        }));
        Arc::new(AgentSession::new(agent_id, AgentConfig::new(agent_id, "openai", "gpt-4o"), adapter))
    }

    #[test]
    fn duplicate_attachment_is_rejected() {
        let mut set = CapabilitySet::new();
        let cap = echo_capability("search");
        set.attach(cap.clone(), Value::Null).unwrap();
        let result = set.attach(cap, Value::Null);
        assert!(result.is_err());
    }

    #[test]
    fn dispatch_increments_usage_counter() {
        let mut set = CapabilitySet::new();
        set.attach(echo_capability("search"), Value::Null).unwrap();
        set.record_dispatch("search").unwrap();
        set.record_dispatch("search").unwrap();
        assert_eq!(set.get("search").unwrap().usage_count(), 2);
    }

    #[test]
    fn detach_then_reattach_is_allowed() {
        let mut set = CapabilitySet::new();
        let cap = echo_capability("search");
        set.attach(cap.clone(), Value::Null).unwrap();
        assert!(set.detach("search"));
        assert!(set.attach(cap, Value::Null).is_ok());
    }

    #[test]
    fn framework_filter() {
        let cap = Capability::new(
            "vision",
            "tool",
            serde_json::json!({}),
            Arc::new(EchoInvoker),
        )
        .for_frameworks(["openai", "anthropic"]);
        assert!(cap.supports_framework("openai"));
        assert!(!cap.supports_framework("ollama"));
    }

    #[test]
    fn validate_params_rejects_missing_required_field() {
        let schema = serde_json::json!({"type": "object", "required": ["query"]});
        assert!(validate_params(&schema, &serde_json::json!({})).is_err());
        assert!(validate_params(&schema, &serde_json::json!({"query": "x"})).is_ok());
    }

    #[test]
    fn validate_params_rejects_type_mismatch() {
        let schema = serde_json::json!({"properties": {"count": {"type": "integer"}}});
        assert!(validate_params(&schema, &serde_json::json!({"count": "not a number"})).is_err());
        assert!(validate_params(&schema, &serde_json::json!({"count": 3})).is_ok());
    }

    #[tokio::test]
    async fn execute_capability_dispatches_and_bumps_counter() {
        let session = test_session("agent-1");
        session.capabilities().lock().attach(echo_capability("search"), Value::Null).unwrap();

        let registry = CapabilityRegistry::new();
        registry.register_agent(session.clone());

        let result = registry
            .execute_capability("agent-1", "search", serde_json::json!({"query": "rust"}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"query": "rust"}));
        assert_eq!(session.capabilities().lock().get("search").unwrap().usage_count(), 1);
    }

    #[tokio::test]
    async fn execute_capability_rejects_schema_violation_without_dispatch() {
        let session = test_session("agent-2");
        session.capabilities().lock().attach(echo_capability("search"), Value::Null).unwrap();

        let registry = CapabilityRegistry::new();
        registry.register_agent(session.clone());

        let result = registry.execute_capability("agent-2", "search", serde_json::json!({})).await;
        assert!(result.is_err());
        assert_eq!(session.capabilities().lock().get("search").unwrap().usage_count(), 0);
    }

    #[tokio::test]
    async fn execute_capability_unknown_agent_errors() {
        let registry = CapabilityRegistry::new();
        let result = registry.execute_capability("ghost", "search", Value::Null).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_capability_propagates_invoker_failure() {
        let session = test_session("agent-3");
        session
            .capabilities()
            .lock()
            .attach(Capability::new("flaky", "tool", serde_json::json!({}), Arc::new(FailingInvoker)), Value::Null)
            .unwrap();

        let registry = CapabilityRegistry::new();
        registry.register_agent(session.clone());

        let result = registry.execute_capability("agent-3", "flaky", Value::Null).await;
        assert_eq!(result.unwrap_err(), "invoker refused");
        assert_eq!(session.capabilities().lock().get("flaky").unwrap().usage_count(), 0);
    }
}
