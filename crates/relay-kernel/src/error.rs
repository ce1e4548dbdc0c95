//! Crate-level error taxonomy shared by every component that sits on the
//! core (tools, agents, workflows, the chat service).
//!
//! The variants mirror the error taxonomy carried across the system: each
//! subsystem maps its own failures onto one of these kinds so that a
//! uniform `{kind, message}` shape can cross the tool/agent/workflow
//! boundary without leaking internal detail (stack traces, raw OS error
//! strings, provider response bodies).

use thiserror::Error;

/// A correlation id attached to `Internal` errors so they can be traced
/// through logs without exposing implementation detail to the caller.
pub type CorrelationId = uuid::Uuid;

/// Crate-wide error type.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum KernelError {
    /// Schema validation failure, missing required field, or unknown tool.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A path escaped the active workspace root, used the wrong namespace,
    /// or a required path did not exist.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An unknown session, attachment, or tool was referenced.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid provider credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An external or internal rate limit was tripped.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A deadline was exceeded on a tool call or a stream.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A wrapped failure from a remote provider.
    #[error("external error ({status:?}): {message}")]
    External {
        status: Option<u16>,
        message: String,
    },

    /// A cooperative stop was observed.
    #[error("cancelled")]
    Cancelled,

    /// An uncaught failure. Carries a short message and a correlation id
    /// for log-side tracing; never a stack trace.
    #[error("internal error [{correlation_id}]: {message}")]
    Internal {
        message: String,
        correlation_id: CorrelationId,
    },
}

impl KernelError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            correlation_id: uuid::Uuid::new_v4(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn external(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::External {
            status,
            message: message.into(),
        }
    }

    /// Short machine-readable tag for the variant, matching spec's taxonomy
    /// names (`INVALID_ARGUMENT`, `INVALID_PATH`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Timeout(_) => "TIMEOUT",
            Self::External { .. } => "EXTERNAL",
            Self::Cancelled => "CANCELLED",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

impl From<std::io::Error> for KernelError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => KernelError::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => KernelError::invalid_path(err.to_string()),
            std::io::ErrorKind::TimedOut => KernelError::Timeout(err.to_string()),
            _ => KernelError::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::invalid_argument(format!("serialization error: {err}"))
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy_names() {
        assert_eq!(KernelError::invalid_argument("x").code(), "INVALID_ARGUMENT");
        assert_eq!(KernelError::invalid_path("x").code(), "INVALID_PATH");
        assert_eq!(KernelError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(KernelError::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: KernelError = io.into();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn internal_carries_correlation_id() {
        let err = KernelError::internal("boom");
        if let KernelError::Internal { correlation_id, .. } = &err {
            assert_ne!(*correlation_id, uuid::Uuid::nil());
        } else {
            panic!("expected Internal variant");
        }
    }
}
