//! Canonical LLM error codes.
//!
//! Codes travel as strings (`"[llm.rate_limit] ..."`) through diagnostics
//! and logs, so the enum converts losslessly to and from its wire form.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LlmErrorCode {
    RateLimit,
    Timeout,
    Authentication,
    InvalidRequest,
    ModelNotFound,
    ContentFiltered,
    InternalServer,
    Aborted,
    ContextLengthExceeded,
    StreamParseError,
    NoAssistantMessage,
    EmptyAssistantContent,
    Unknown,
    /// A code embedded by some other layer that we do not know about
    Other(String),
}

impl LlmErrorCode {
    const KNOWN: [LlmErrorCode; 13] = [
        Self::RateLimit,
        Self::Timeout,
        Self::Authentication,
        Self::InvalidRequest,
        Self::ModelNotFound,
        Self::ContentFiltered,
        Self::InternalServer,
        Self::Aborted,
        Self::ContextLengthExceeded,
        Self::StreamParseError,
        Self::NoAssistantMessage,
        Self::EmptyAssistantContent,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::RateLimit => "llm.rate_limit",
            Self::Timeout => "llm.timeout",
            Self::Authentication => "llm.authentication",
            Self::InvalidRequest => "llm.invalid_request",
            Self::ModelNotFound => "llm.model_not_found",
            Self::ContentFiltered => "llm.content_filtered",
            Self::InternalServer => "llm.internal_server",
            Self::Aborted => "llm.request.aborted",
            Self::ContextLengthExceeded => "llm.context.length_exceeded",
            Self::StreamParseError => "llm.stream.parse_error",
            Self::NoAssistantMessage => "llm.no_assistant_message",
            Self::EmptyAssistantContent => "llm.empty_assistant_content",
            Self::Unknown => "llm.error.unknown",
            Self::Other(code) => code,
        }
    }

    /// Parse a wire code. Unrecognised codes are kept as [`Self::Other`].
    pub fn from_code(code: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|known| known.as_str() == code)
            .unwrap_or_else(|| Self::Other(code.to_string()))
    }

    /// Worth retrying with the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::InternalServer)
    }

    pub fn is_context_overflow(&self) -> bool {
        matches!(self, Self::ContextLengthExceeded)
    }

    /// Prefix `message` with `[code] ` unless it already carries a code.
    pub fn tag(&self, message: &str) -> String {
        if message.starts_with('[') && message.find(']').is_some_and(|end| end > 1) {
            return message.to_string();
        }
        format!("[{}] {}", self.as_str(), message)
    }
}

impl std::fmt::Display for LlmErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LlmErrorCode {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<LlmErrorCode> for String {
    fn from(code: LlmErrorCode) -> Self {
        code.as_str().to_string()
    }
}
