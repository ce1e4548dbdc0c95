//! Provider-agnostic streaming types: a `delta` of text plus an
//! optional terminal `finish_reason` and incremental usage counters.

use std::pin::Pin;

use futures::Stream;

/// Why a model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// Incremental token-usage counters, accumulated across a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// One unit of a streamed response.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub delta: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<UsageDelta>,
}

impl StreamChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self { delta: delta.into(), finish_reason: None, usage: None }
    }

    pub fn done(finish_reason: FinishReason) -> Self {
        Self { delta: String::new(), finish_reason: Some(finish_reason), usage: None }
    }

    pub fn is_done(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Failure surfaced mid-stream.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum StreamError {
    #[error("provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("stream timeout: {0}")]
    Timeout(String),
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }
}

pub trait TokenStream: Stream<Item = Result<StreamChunk, StreamError>> + Send {}
impl<T> TokenStream for T where T: Stream<Item = Result<StreamChunk, StreamError>> + Send {}

pub type BoxTokenStream = Pin<Box<dyn TokenStream>>;

/// The non-streaming completion shape returned by `FrameworkAdapter::run`.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub content: String,
    pub status: RunStatus,
    pub metadata: serde_json::Value,
    pub usage: Option<UsageDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn chunk_constructors_and_predicates() {
        let t = StreamChunk::text("hello");
        assert_eq!(t.delta, "hello");
        assert!(!t.is_done());

        let d = StreamChunk::done(FinishReason::Stop);
        assert!(d.is_done());
        assert_eq!(d.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn box_token_stream_roundtrip() {
        let items = vec![
            Ok(StreamChunk::text("Hi")),
            Err(StreamError::Connection("lost".into())),
            Ok(StreamChunk::done(FinishReason::Stop)),
        ];
        let mut s: BoxTokenStream = Box::pin(futures::stream::iter(items));

        assert_eq!(s.next().await.unwrap().unwrap().delta, "Hi");
        assert!(s.next().await.unwrap().is_err());
        assert!(s.next().await.unwrap().unwrap().is_done());
        assert!(s.next().await.is_none());
    }
}
