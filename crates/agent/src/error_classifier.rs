//! Maps model-call failures to canonical [`LlmErrorCode`]s.
//!
//! Classification runs in priority order:
//!
//! 1. an explicit `[code] message` prefix anywhere in the cause chain,
//! 2. known failure types ([`ProviderError`] variants, I/O timeouts, JSON
//!    parse errors),
//! 3. case-insensitive phrase patterns from [`PHRASE_RULES`],
//! 4. [`LlmErrorCode::Unknown`].
//!
//! A 4xx API error that matches no phrase falls back to
//! [`LlmErrorCode::InvalidRequest`] rather than unknown.

use std::error::Error as StdError;

use rivet_core::code::LlmErrorCode;
use rivet_core::error::ProviderError;
use rivet_core::provider::ProviderResponse;

/// Cause chains deeper than this are not inspected.
const MAX_CAUSE_DEPTH: usize = 32;

/// One row of the phrase table: any phrase matches → code.
pub struct PhraseRule {
    pub code: LlmErrorCode,
    pub phrases: &'static [&'static str],
}

/// Phrase patterns, checked top to bottom. Phrases are lowercase.
pub static PHRASE_RULES: &[PhraseRule] = &[
    PhraseRule {
        code: LlmErrorCode::ContextLengthExceeded,
        phrases: &[
            "context_length_exceeded",
            "maximum context length",
            "exceeds maximum input length",
            "context length",
            "context window",
            "maximum context",
            "token limit exceeded",
            "too many tokens",
            "prompt is too long",
            "request too large",
        ],
    },
    PhraseRule {
        code: LlmErrorCode::RateLimit,
        phrases: &["rate limit", "rate_limit", "too many requests", "quota exceeded"],
    },
    PhraseRule {
        code: LlmErrorCode::Authentication,
        phrases: &["invalid api key", "incorrect api key", "unauthorized", "authentication"],
    },
    PhraseRule {
        code: LlmErrorCode::Timeout,
        phrases: &["timed out", "timeout", "deadline exceeded"],
    },
    PhraseRule {
        code: LlmErrorCode::StreamParseError,
        phrases: &["failed to parse", "unexpected end of json", "malformed stream", "invalid sse"],
    },
    PhraseRule {
        code: LlmErrorCode::ModelNotFound,
        phrases: &["model not found", "model_not_found", "no such model"],
    },
    PhraseRule {
        code: LlmErrorCode::ContentFiltered,
        phrases: &["content filter", "content_filter", "content policy"],
    },
    PhraseRule {
        code: LlmErrorCode::InternalServer,
        phrases: &["internal server error", "service unavailable", "bad gateway", "overloaded"],
    },
];

enum TypeMatch {
    Definite(LlmErrorCode),
    /// Only used when no phrase matches either
    Fallback(LlmErrorCode),
}

fn chain<'a>(failure: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(failure), |e| (*e).source()).take(MAX_CAUSE_DEPTH)
}

/// Classify a failure. `None` classifies as unknown.
pub fn classify_error(failure: Option<&(dyn StdError + 'static)>) -> LlmErrorCode {
    let Some(failure) = failure else {
        return LlmErrorCode::Unknown;
    };

    if let Some(code) = chain(failure).find_map(|e| extract_code(&e.to_string())) {
        return code;
    }

    let mut fallback = None;
    for e in chain(failure) {
        match classify_known_type(e) {
            Some(TypeMatch::Definite(code)) => return code,
            Some(TypeMatch::Fallback(code)) if fallback.is_none() => fallback = Some(code),
            _ => {}
        }
    }

    if let Some(code) = chain(failure).find_map(|e| match_phrases(&e.to_string())) {
        return code;
    }

    fallback.unwrap_or(LlmErrorCode::Unknown)
}

/// Classify a bare diagnostic string (embedded code, then phrases).
pub fn classify_message(message: Option<&str>) -> LlmErrorCode {
    let Some(message) = message else {
        return LlmErrorCode::Unknown;
    };
    extract_code(message)
        .or_else(|| match_phrases(message))
        .unwrap_or(LlmErrorCode::Unknown)
}

/// Pull `code` out of `"[code] message"`.
pub fn extract_code(message: &str) -> Option<LlmErrorCode> {
    let rest = message.strip_prefix('[')?;
    let end = rest.find(']')?;
    let code = &rest[..end];
    if code.is_empty() || code.chars().any(char::is_whitespace) {
        return None;
    }
    Some(LlmErrorCode::from_code(code))
}

/// Why a response that carries no tool calls cannot be used as a final
/// answer, if it cannot.
pub fn classify_empty_response(response: Option<&ProviderResponse>) -> Option<LlmErrorCode> {
    let Some(response) = response else {
        return Some(LlmErrorCode::NoAssistantMessage);
    };
    match response.content.as_deref() {
        None => Some(LlmErrorCode::NoAssistantMessage),
        Some(text) if text.trim().is_empty() => Some(LlmErrorCode::EmptyAssistantContent),
        Some(_) => None,
    }
}

/// The innermost cause.
pub fn root_cause<'a>(failure: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    chain(failure).last().unwrap_or(failure)
}

fn match_phrases(message: &str) -> Option<LlmErrorCode> {
    let lower = message.to_lowercase();
    PHRASE_RULES
        .iter()
        .find(|rule| rule.phrases.iter().any(|p| lower.contains(p)))
        .map(|rule| rule.code.clone())
}

fn classify_known_type(e: &(dyn StdError + 'static)) -> Option<TypeMatch> {
    if let Some(err) = e.downcast_ref::<ProviderError>() {
        return classify_provider_error(err);
    }
    if let Some(err) = e.downcast_ref::<std::io::Error>() {
        return (err.kind() == std::io::ErrorKind::TimedOut).then_some(TypeMatch::Definite(LlmErrorCode::Timeout));
    }
    if e.is::<tokio::time::error::Elapsed>() {
        return Some(TypeMatch::Definite(LlmErrorCode::Timeout));
    }
    if e.is::<serde_json::Error>() {
        return Some(TypeMatch::Definite(LlmErrorCode::StreamParseError));
    }
    None
}

fn classify_provider_error(err: &ProviderError) -> Option<TypeMatch> {
    use TypeMatch::{Definite, Fallback};

    let matched = match err {
        ProviderError::RateLimited { .. } => Definite(LlmErrorCode::RateLimit),
        ProviderError::AuthenticationFailed(_) => Definite(LlmErrorCode::Authentication),
        ProviderError::ModelNotFound(_) => Definite(LlmErrorCode::ModelNotFound),
        ProviderError::ContextLengthExceeded(_) => Definite(LlmErrorCode::ContextLengthExceeded),
        ProviderError::ContentFiltered(_) => Definite(LlmErrorCode::ContentFiltered),
        ProviderError::StreamParse(_) => Definite(LlmErrorCode::StreamParseError),
        ProviderError::Timeout(_) => Definite(LlmErrorCode::Timeout),
        ProviderError::Aborted(_) => Definite(LlmErrorCode::Aborted),
        ProviderError::ApiError { status_code, .. } => match status_code {
            429 => Definite(LlmErrorCode::RateLimit),
            401 | 403 => Definite(LlmErrorCode::Authentication),
            408 | 504 => Definite(LlmErrorCode::Timeout),
            500..=599 => Definite(LlmErrorCode::InternalServer),
            400..=499 => Fallback(LlmErrorCode::InvalidRequest),
            _ => return None,
        },
        ProviderError::Network(_) | ProviderError::NotConfigured(_) | ProviderError::Other { .. } => {
            return None;
        }
    };
    Some(matched)
}
