//! Framework adapter contract, provider-agnostic streaming types, and the
//! OpenAI-style multimodal adapter.

pub mod adapter;
pub mod openai;
pub mod prompt;
pub mod types;

pub use adapter::FrameworkAdapter;
pub use openai::{OpenAiAdapter, OpenAiConfig};
pub use prompt::{ContentPart, ImageResolver, Prompt, PromptTurn, Role, TurnContent};
pub use types::{BoxTokenStream, FinishReason, RunResponse, RunStatus, StreamChunk, StreamError, TokenStream, UsageDelta};
