//! Error types for the Rivet domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator of the turn loop has its own error enum; none of them
//! abort a turn on their own, the turn processor decides what they mean.

use std::sync::Arc;
use thiserror::Error;

/// The top-level error type for Rivet operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Compaction error: {0}")]
    Compaction(#[from] CompactionError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A shared, cloneable cause attached to a provider failure.
///
/// `Arc<dyn Error>` forwards `source()` past the wrapped error itself, so
/// the cause would vanish from the chain. This newtype yields the wrapped
/// error as its source, keeping it reachable for downcasting.
#[derive(Debug, Clone)]
pub struct SharedCause(Arc<dyn std::error::Error + Send + Sync>);

impl SharedCause {
    pub fn new(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(cause))
    }

    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl std::fmt::Display for SharedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}

/// Failures raised by a model client.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Failed to parse stream: {0}")]
    StreamParse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request aborted: {0}")]
    Aborted(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Anything else. The optional `source` keeps the cause chain intact so
    /// that wrapped failures can still be classified.
    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: Option<SharedCause>,
    },
}

impl ProviderError {
    /// Shorthand for an [`ProviderError::Other`] without a cause.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying failure, keeping it reachable through `source()`.
    pub fn wrap(message: impl Into<String>, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other {
            message: message.into(),
            source: Some(SharedCause::new(cause)),
        }
    }

    /// Short variant name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiError { .. } => "api_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::ModelNotFound(_) => "model_not_found",
            Self::ContextLengthExceeded(_) => "context_length_exceeded",
            Self::ContentFiltered(_) => "content_filtered",
            Self::StreamParse(_) => "stream_parse",
            Self::Timeout(_) => "timeout",
            Self::Aborted(_) => "aborted",
            Self::Network(_) => "network",
            Self::NotConfigured(_) => "not_configured",
            Self::Other { .. } => "other",
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan not found: {0}")]
    NotFound(String),

    #[error("Plan is not accepting steps: {0}")]
    Closed(String),

    #[error("Plan storage failed: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("Nothing to compact: {total} message(s), keeping {keep_last}")]
    NothingToCompact { total: usize, keep_last: usize },

    #[error("Summarization failed: {0}")]
    SummaryFailed(String),

    #[error("Compaction failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "shell".into(),
            reason: "command not in allowlist".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("allowlist"));
    }

    #[test]
    fn wrapped_provider_error_exposes_source() {
        let inner = ProviderError::Timeout("read timed out".into());
        let err = ProviderError::wrap("chat call failed", inner);
        let source = err.source().expect("wrapped error has a source");
        assert!(source.to_string().contains("read timed out"));
    }

    #[test]
    fn wrapped_cause_is_downcastable_in_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket stalled");
        let err = ProviderError::wrap("transport failed", io);
        let found = std::iter::successors(Some(&err as &(dyn std::error::Error + 'static)), |e| (*e).source())
            .find_map(|e| e.downcast_ref::<std::io::Error>());
        assert_eq!(found.map(|e| e.kind()), Some(std::io::ErrorKind::TimedOut));
    }

    #[test]
    fn plain_other_has_no_source() {
        let err = ProviderError::other("boom");
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "boom");
    }
}
