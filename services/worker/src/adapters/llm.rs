//! services/worker/src/adapters/llm.rs
//!
//! This module contains the adapter for the external completion API.
//! It implements the `LlmGateway` port from the `core` crate using an
//! OpenAI-compatible chat-completions endpoint.
//!
//! The adapter does exactly one bounded request per call: auth, timeout,
//! and error classification live here, retry policy does not.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use cat_tales_core::llm::{Completion, CompletionRequest, GatewayError, GatewayErrorKind, TokenUsage};
use cat_tales_core::ports::LlmGateway;
use std::time::Duration;
use tracing::debug;

/// An adapter that implements `LlmGateway` against an OpenAI-compatible
/// chat-completions API.
#[derive(Clone)]
pub struct OpenAiGatewayAdapter {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAiGatewayAdapter {
    /// Creates a new `OpenAiGatewayAdapter` with the given request timeout.
    pub fn new(client: Client<OpenAIConfig>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Maps a client-library error onto the structured gateway taxonomy.
    /// The typed `ApiError` carries the upstream `type` field which is the
    /// most reliable signal; the free-text classifier is the fallback.
    fn map_error(error: OpenAIError) -> GatewayError {
        match error {
            OpenAIError::ApiError(api) => {
                let type_hint = api.r#type.clone().unwrap_or_default();
                let kind = match type_hint.as_str() {
                    "rate_limit_exceeded" | "insufficient_quota" | "tokens" | "requests" => {
                        GatewayErrorKind::RateLimited
                    }
                    "invalid_api_key" | "authentication_error" | "invalid_request_error"
                        if api.message.to_lowercase().contains("api key") =>
                    {
                        GatewayErrorKind::Auth
                    }
                    "server_error" => GatewayErrorKind::ServerError,
                    "content_policy_violation" | "content_filter" => {
                        GatewayErrorKind::ContentPolicy
                    }
                    "context_length_exceeded" | "max_tokens" => GatewayErrorKind::TokenBudget,
                    _ => GatewayErrorKind::classify_message(&format!(
                        "{type_hint} {}",
                        api.message
                    )),
                };
                GatewayError::new(kind, api.message)
            }
            OpenAIError::JSONDeserialize(e, _) => GatewayError::new(
                GatewayErrorKind::Malformed,
                format!("failed to decode completion response: {e}"),
            ),
            other => GatewayError::from_message(other.to_string()),
        }
    }
}

#[async_trait]
impl LlmGateway for OpenAiGatewayAdapter {
    /// Sends one completion request with the orchestrator-supplied sampling
    /// parameters and returns the text plus token usage.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GatewayError> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.as_str())
                .build()
                .map_err(|e| GatewayError::new(GatewayErrorKind::Unknown, e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_prompt.as_str())
                .build()
                .map_err(|e| GatewayError::new(GatewayErrorKind::Unknown, e.to_string()))?
                .into(),
        ];

        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.params.temperature)
            .top_p(request.params.top_p)
            .max_tokens(request.params.max_tokens)
            .frequency_penalty(request.params.frequency_penalty)
            .presence_penalty(request.params.presence_penalty)
            .build()
            .map_err(|e| GatewayError::new(GatewayErrorKind::Unknown, e.to_string()))?;

        debug!(model = %request.model, max_tokens = request.params.max_tokens, "sending completion request");

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(api_request))
            .await
            .map_err(|_| {
                GatewayError::new(
                    GatewayErrorKind::Timeout,
                    format!("completion timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(Self::map_error)?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or(TokenUsage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            });

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                GatewayError::new(
                    GatewayErrorKind::Malformed,
                    "completion response contained no text content",
                )
            })?;

        Ok(Completion { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(r#type: Option<&str>, message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: r#type.map(str::to_string),
            param: None,
            code: None,
        })
    }

    #[test]
    fn typed_api_errors_map_onto_the_taxonomy() {
        let err = OpenAiGatewayAdapter::map_error(api_error(
            Some("rate_limit_exceeded"),
            "Rate limit reached for requests",
        ));
        assert_eq!(err.kind, GatewayErrorKind::RateLimited);
        assert!(err.is_retryable());

        let err = OpenAiGatewayAdapter::map_error(api_error(
            Some("content_policy_violation"),
            "flagged by moderation",
        ));
        assert_eq!(err.kind, GatewayErrorKind::ContentPolicy);
        assert!(!err.is_retryable());
    }

    #[test]
    fn untyped_api_error_falls_back_to_message_classification() {
        let err = OpenAiGatewayAdapter::map_error(api_error(
            None,
            "The server had an internal error while processing your request",
        ));
        assert_eq!(err.kind, GatewayErrorKind::ServerError);
    }

    #[test]
    fn undecodable_response_body_maps_to_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = OpenAiGatewayAdapter::map_error(OpenAIError::JSONDeserialize(
            json_err,
            "<html>bad gateway</html>".to_string(),
        ));
        assert_eq!(err.kind, GatewayErrorKind::Malformed);
        assert!(err.message.contains("failed to decode"));
    }
}
