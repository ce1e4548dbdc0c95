//! An OpenAI-style chat completion adapter: builds a multimodal
//! request body, picks the token-count parameter per model
//! family, and falls back to a deterministic simulated response when no
//! API key is configured so callers never block silently on missing
//! credentials.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use relay_kernel::{KernelError, KernelResult};
use serde_json::json;
use tracing::{debug, warn};

use crate::adapter::FrameworkAdapter;
use crate::prompt::{ContentPart, Prompt, Role, TurnContent};
use crate::types::{BoxTokenStream, FinishReason, RunResponse, RunStatus, StreamChunk};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl OpenAiConfig {
    /// Reads `OPENAI_API_KEY` / `OPENAI_BASE_URL` from the environment;
    /// `model` must still be supplied explicitly.
    pub fn from_env(model: impl Into<String>) -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: model.into(),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        }
    }
}

/// Returns the request field that carries the output-token budget for
/// `model`. Reasoning-family models (`o1`, `o3`, ...) use
/// `max_completion_tokens`; everything else uses `max_tokens`.
fn token_parameter_name(model: &str) -> &'static str {
    let lower = model.to_lowercase();
    if lower.starts_with("o1") || lower.starts_with("o3") || lower.starts_with("o4") || lower.contains("reasoning") {
        "max_completion_tokens"
    } else {
        "max_tokens"
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn turn_to_json(turn: &crate::prompt::PromptTurn) -> serde_json::Value {
    let content = match &turn.content {
        TurnContent::Text(text) => json!(text),
        TurnContent::Multimodal(parts) => json!(parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => json!({"type": "text", "text": text}),
                ContentPart::ImageUrl { url } => json!({"type": "image_url", "image_url": {"url": url}}),
            })
            .collect::<Vec<_>>()),
    };
    json!({ "role": role_name(turn.role), "content": content })
}

fn build_request_body(config: &OpenAiConfig, prompt: &Prompt, stream: bool, max_output_tokens: u32) -> serde_json::Value {
    let mut body = json!({
        "model": config.model,
        "messages": prompt.turns.iter().map(turn_to_json).collect::<Vec<_>>(),
        "stream": stream,
    });
    body[token_parameter_name(&config.model)] = json!(max_output_tokens);
    body
}

fn flatten_prompt_text(prompt: &Prompt) -> String {
    prompt
        .turns
        .iter()
        .map(|t| match &t.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Multimodal(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.clone()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: reqwest::Client,
    stopped: Arc<AtomicBool>,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client builds with default TLS backend"),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn simulated_response(&self, prompt: &Prompt) -> RunResponse {
        let summary = flatten_prompt_text(prompt);
        let preview: String = summary.chars().take(120).collect();
        RunResponse {
            content: format!("[simulated response to: {preview}]"),
            status: RunStatus::Completed,
            metadata: json!({ "simulated": true, "model": self.config.model }),
            usage: None,
        }
    }
}

#[async_trait]
impl FrameworkAdapter for OpenAiAdapter {
    async fn initialize(&self) -> KernelResult<bool> {
        if self.config.api_key.is_none() {
            warn!(model = %self.config.model, "no API key configured, adapter will run in simulated mode");
        }
        Ok(self.config.api_key.is_some())
    }

    async fn run(&self, prompt: &Prompt, _context: Option<&serde_json::Value>) -> KernelResult<RunResponse> {
        let Some(api_key) = &self.config.api_key else {
            return Ok(self.simulated_response(prompt));
        };

        let body = build_request_body(&self.config, prompt, false, 2048);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| KernelError::external(None, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KernelError::external(Some(status.as_u16()), text));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| KernelError::external(None, format!("invalid response body: {e}")))?;

        let content = payload["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string();

        Ok(RunResponse {
            content,
            status: RunStatus::Completed,
            metadata: json!({ "model": self.config.model }),
            usage: None,
        })
    }

    async fn run_streaming(&self, prompt: &Prompt, _context: Option<&serde_json::Value>) -> KernelResult<BoxTokenStream> {
        if self.config.api_key.is_none() {
            let words: Vec<String> = self
                .simulated_response(prompt)
                .content
                .split(' ')
                .map(|w| format!("{w} "))
                .collect();
            let stopped = self.stopped.clone();
            debug!("producing simulated token stream");
            let items: Vec<Result<StreamChunk, crate::types::StreamError>> = words
                .into_iter()
                .map(Ok)
                .map(|r: Result<String, crate::types::StreamError>| r.map(StreamChunk::text))
                .chain(std::iter::once(Ok(StreamChunk::done(FinishReason::Stop))))
                .collect();
            let filtered = stream::iter(items).take_while(move |_| {
                let keep = !stopped.load(Ordering::SeqCst);
                async move { keep }
            });
            return Ok(Box::pin(filtered));
        }

        // A real streaming client would parse server-sent events off the
        // response body; left unimplemented pending a concrete HTTP
        // provider (out of scope for this core).
        Err(KernelError::internal("live streaming transport not wired for this adapter build"))
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn cleanup(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(OpenAiConfig { api_key: None, model: "gpt-4o".into(), base_url: "https://api.openai.com/v1".into() })
    }

    #[test]
    fn reasoning_models_use_completion_tokens_param() {
        assert_eq!(token_parameter_name("o1-preview"), "max_completion_tokens");
        assert_eq!(token_parameter_name("o3-mini"), "max_completion_tokens");
        assert_eq!(token_parameter_name("gpt-4o"), "max_tokens");
    }

    #[tokio::test]
    async fn initialize_reports_false_without_api_key() {
        let adapter = adapter();
        assert_eq!(adapter.initialize().await.unwrap(), false);
    }

    #[tokio::test]
    async fn run_without_api_key_is_deterministic_and_simulated() {
        let adapter = adapter();
        let prompt = Prompt::new().push_text(Role::User, "hello there");
        let a = adapter.run(&prompt, None).await.unwrap();
        let b = adapter.run(&prompt, None).await.unwrap();
        assert_eq!(a.content, b.content);
        assert!(a.content.contains("hello there"));
        assert_eq!(a.metadata["simulated"], true);
    }

    #[tokio::test]
    async fn run_streaming_without_api_key_ends_with_finish_reason() {
        use futures::StreamExt;
        let adapter = adapter();
        let prompt = Prompt::new().push_text(Role::User, "hi");
        let mut stream = adapter.run_streaming(&prompt, None).await.unwrap();
        let mut saw_done = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if chunk.is_done() {
                saw_done = true;
            }
        }
        assert!(saw_done);
    }

    #[tokio::test]
    async fn stop_halts_further_chunks() {
        use futures::StreamExt;
        let adapter = adapter();
        adapter.stop().await;
        let prompt = Prompt::new().push_text(Role::User, "a fairly long sentence to stream");
        let mut stream = adapter.run_streaming(&prompt, None).await.unwrap();
        assert!(stream.next().await.is_none());
    }
}
