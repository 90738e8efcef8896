//! crates/cat_tales_core/src/llm.rs
//!
//! Request/response types for the LLM gateway port, plus the gateway error
//! taxonomy. The error carries a structured [`GatewayErrorKind`] set at the
//! point the error is raised; retry decisions and the user-facing failure
//! messages are exhaustive matches over that kind instead of fragile text
//! matching. A substring classifier is still provided for upstreams that
//! only hand back free-text messages.

use crate::params::GenerationParams;
use serde::{Deserialize, Serialize};

/// A single completion request, fully assembled by the orchestrator.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Concrete model name (e.g. "gpt-4o-mini"), resolved from the tier.
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub params: GenerationParams,
}

/// Token accounting reported by the completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A successful completion: the raw text plus token usage.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// What went wrong at the gateway, reduced to the categories the retry
/// policy and the user-message mapping care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// HTTP 429 or an explicit rate-limit message.
    RateLimited,
    /// The bounded call did not return in time.
    Timeout,
    /// 5xx / "internal error" / "service unavailable" class failures.
    ServerError,
    /// The provider refused the content on policy/safety grounds.
    ContentPolicy,
    /// 401/403 — a configuration problem, retrying cannot help.
    Auth,
    /// Context/token budget exceeded.
    TokenBudget,
    /// The response body could not be parsed into the expected shape.
    Malformed,
    Unknown,
}

impl GatewayErrorKind {
    /// Whether the queue substrate should retry an attempt that failed with
    /// this kind. Non-retryable failures are surfaced once and swallowed so
    /// no further spend is wasted on them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::ServerError | Self::Unknown
        )
    }

    /// The message shown to the end user when a generation fails with this
    /// kind. Technical detail stays in logs, never in this string.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => {
                "AI service is currently busy. Your request will be retried shortly."
            }
            Self::Timeout => {
                "The AI service took too long to respond. Try again with a shorter document."
            }
            Self::ServerError => {
                "The AI service is temporarily unavailable. Please try again later."
            }
            Self::ContentPolicy => {
                "This document was blocked by the AI service's content guidelines."
            }
            Self::TokenBudget => "This document is too long for the selected AI model.",
            Self::Auth => "The AI service rejected our credentials. Please contact support.",
            Self::Malformed => {
                "The AI service returned an unexpected response. Please try regenerating."
            }
            Self::Unknown => "Something went wrong while generating your story. Please try again.",
        }
    }

    /// Fallback classification for free-text error messages, used when the
    /// upstream provides no machine-readable code. Case-insensitive
    /// substring matching over the phrases the completion API is known to
    /// emit.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimited
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("server error")
            || lower.contains("internal error")
            || lower.contains("service unavailable")
            || lower.contains("temporarily unavailable")
            || lower.contains("unavailable")
        {
            Self::ServerError
        } else if lower.contains("content policy")
            || lower.contains("content_policy")
            || lower.contains("safety")
            || lower.contains("content management policy")
        {
            Self::ContentPolicy
        } else if lower.contains("maximum context length")
            || lower.contains("context length")
            || lower.contains("token limit")
            || lower.contains("max_tokens")
            || lower.contains("too many tokens")
        {
            Self::TokenBudget
        } else if lower.contains("api key")
            || lower.contains("authentication")
            || lower.contains("unauthorized")
            || lower.contains("invalid_api_key")
        {
            Self::Auth
        } else if lower.contains("invalid json") || lower.contains("malformed") {
            Self::Malformed
        } else {
            Self::Unknown
        }
    }
}

/// Failure of a single gateway call. The upstream message is preserved
/// verbatim for logs; `kind` drives everything else.
#[derive(Debug, Clone, thiserror::Error)]
#[error("LLM gateway error ({kind:?}{}): {message}", status.map(|s| format!(", HTTP {s}")).unwrap_or_default())]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Builds an error from a free-text upstream message, classifying it by
    /// substring.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: GatewayErrorKind::classify_message(&message),
            status: None,
            message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_is_retryable() {
        let err = GatewayError::from_message("Rate limit exceeded, please retry");
        assert_eq!(err.kind, GatewayErrorKind::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn malformed_json_is_not_retryable() {
        let err = GatewayError::from_message("Invalid JSON in response: Syntax error");
        assert_eq!(err.kind, GatewayErrorKind::Malformed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            GatewayErrorKind::classify_message("RATE LIMIT reached"),
            GatewayErrorKind::RateLimited
        );
        assert_eq!(
            GatewayErrorKind::classify_message("Service Temporarily Unavailable"),
            GatewayErrorKind::ServerError
        );
        assert_eq!(
            GatewayErrorKind::classify_message("Request TIMED OUT after 120s"),
            GatewayErrorKind::Timeout
        );
    }

    #[test]
    fn auth_and_policy_failures_are_terminal() {
        for kind in [
            GatewayErrorKind::Auth,
            GatewayErrorKind::ContentPolicy,
            GatewayErrorKind::TokenBudget,
            GatewayErrorKind::Malformed,
        ] {
            assert!(!kind.is_retryable(), "{kind:?} must not be retried");
        }
    }

    #[test]
    fn every_kind_has_a_user_message() {
        // The user never sees the raw upstream text for gateway failures.
        let kinds = [
            GatewayErrorKind::RateLimited,
            GatewayErrorKind::Timeout,
            GatewayErrorKind::ServerError,
            GatewayErrorKind::ContentPolicy,
            GatewayErrorKind::TokenBudget,
            GatewayErrorKind::Auth,
            GatewayErrorKind::Malformed,
            GatewayErrorKind::Unknown,
        ];
        for kind in kinds {
            assert!(!kind.user_message().is_empty());
        }
    }
}
