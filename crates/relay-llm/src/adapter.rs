//! The framework adapter contract: `initialize`, `run`, `run_streaming`,
//! `stop`, `cleanup`. Every concrete adapter (OpenAI-style today; other
//! providers slot in behind the same trait) implements this.

use async_trait::async_trait;
use relay_kernel::KernelResult;

use crate::prompt::Prompt;
use crate::types::{BoxTokenStream, RunResponse};

#[async_trait]
pub trait FrameworkAdapter: Send + Sync {
    /// Performs any one-time setup (credential check, client construction).
    /// Returns `false` rather than erroring when the adapter is usable only
    /// in simulated mode (no API key configured).
    async fn initialize(&self) -> KernelResult<bool>;

    /// Runs to completion and returns the aggregated response.
    async fn run(&self, prompt: &Prompt, context: Option<&serde_json::Value>) -> KernelResult<RunResponse>;

    /// Runs as a lazily-produced sequence of chunks.
    async fn run_streaming(&self, prompt: &Prompt, context: Option<&serde_json::Value>) -> KernelResult<BoxTokenStream>;

    /// Requests in-flight work stop at the next chunk boundary.
    async fn stop(&self);

    /// Releases any adapter-held resources (connections, temp state).
    async fn cleanup(&self);
}
