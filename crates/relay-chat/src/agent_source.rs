//! How the chat service reaches an agent: either a dynamically-resolved
//! custom agent, or the configured default agent session.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use relay_agent::AgentMessage;
use relay_kernel::Message;

pub type BoxAgentStream = Pin<Box<dyn Stream<Item = AgentMessage> + Send>>;

/// A dynamically resolved agent, named by `agent_type`, that the chat
/// service can route a turn to instead of the default agent.
#[async_trait]
pub trait CustomAgent: Send + Sync {
    fn agent_type(&self) -> &str;

    /// `history` is the last *N* persisted messages of the session;
    /// `current_turn` is the just-arrived user message (already
    /// normalized, with any image attachments present).
    async fn run_streaming(&self, history: &[Message], current_turn: &Message) -> BoxAgentStream;
}
