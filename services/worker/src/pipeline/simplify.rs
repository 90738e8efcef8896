//! services/worker/src/pipeline/simplify.rs
//!
//! Orchestrates one story generation: derive sampling parameters, budget
//! and truncate the source text, call the LLM gateway through the shared
//! throttle, parse the structured response, score it, and complete the
//! simplification with every generated field at once.
//!
//! Failure handling follows the gateway error taxonomy: the simplification
//! is marked failed with the classified user-facing message, and the error
//! is re-raised only when a further attempt could plausibly succeed.

use crate::config::Config;
use crate::pipeline::{prompt, PipelineError};
use cat_tales_core::domain::{
    Document, DocumentStatus, GeneratedStory, Simplification, SimplificationStatus,
};
use cat_tales_core::llm::{CompletionRequest, GatewayError, GatewayErrorKind};
use cat_tales_core::params::{available_source_chars, truncate_source, GenerationParams};
use cat_tales_core::ports::{LlmGateway, Store, Throttle};
use cat_tales_core::{scoring, GenerationOutcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub struct SimplificationOrchestrator {
    store: Arc<dyn Store>,
    gateway: Arc<dyn LlmGateway>,
    throttle: Arc<dyn Throttle>,
    config: Arc<Config>,
}

impl SimplificationOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn LlmGateway>,
        throttle: Arc<dyn Throttle>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            gateway,
            throttle,
            config,
        }
    }

    /// Runs one generation attempt for a simplification.
    ///
    /// Preconditions absorb duplicate deliveries: the simplification must
    /// still be `pending` and its parent document must be `completed` with
    /// extracted text. A violated precondition ends the job cleanly.
    pub async fn generate(&self, simplification_id: Uuid) -> Result<(), PipelineError> {
        let mut simplification = self.store.get_simplification(simplification_id).await?;

        if simplification.status != SimplificationStatus::Pending {
            info!(
                %simplification_id,
                status = simplification.status.as_str(),
                "simplification is not pending, skipping (duplicate delivery?)"
            );
            return Ok(());
        }

        let document = self.store.get_document(simplification.document_id).await?;
        let Some(source_text) = processable_source(&document) else {
            warn!(
                %simplification_id,
                document_id = %document.id,
                document_status = document.status.as_str(),
                "parent document has no usable extracted content, skipping"
            );
            return Ok(());
        };
        let source_text = source_text.to_string();

        simplification.begin_processing()?;
        self.store.save_simplification(&simplification).await?;

        match self
            .run_generation(&simplification, &document, &source_text)
            .await
        {
            Ok(outcome) => {
                let tokens = outcome.tokens_used;
                let cost = outcome.cost_usd;
                simplification.complete_generation(outcome);
                self.store.save_simplification(&simplification).await?;
                info!(
                    %simplification_id,
                    tokens,
                    cost_usd = cost,
                    "story generation completed"
                );
                Ok(())
            }
            Err(e) => {
                let user_message = match &e {
                    PipelineError::Gateway(g) => g.kind.user_message().to_string(),
                    other => other.to_string(),
                };
                warn!(%simplification_id, error = %e, "story generation failed");
                simplification.mark_failed(user_message);
                self.store.save_simplification(&simplification).await?;
                if e.is_retryable() {
                    Err(e)
                } else {
                    // Terminal failure classes would fail again identically;
                    // swallow so the queue does not spend further attempts.
                    Ok(())
                }
            }
        }
    }

    async fn run_generation(
        &self,
        simplification: &Simplification,
        document: &Document,
        source_text: &str,
    ) -> Result<GenerationOutcome, PipelineError> {
        let tier = simplification.model_tier;
        let complexity = simplification.complexity;
        let params = GenerationParams::for_request(complexity, tier);

        let budget = available_source_chars(self.config.context_tokens(tier), params.max_tokens);
        let content = truncate_source(source_text, budget);

        let title = document
            .title
            .as_deref()
            .unwrap_or(&document.original_filename);
        let request = CompletionRequest {
            model: self.config.model_name(tier).to_string(),
            system_prompt: prompt::system_prompt(complexity).to_string(),
            user_prompt: prompt::user_prompt(title, &content),
            params,
        };

        // Rough token estimate for the throttle: prompt chars / 3 plus the
        // completion budget.
        let estimated_tokens =
            (request.user_prompt.len() as u32 / 3).saturating_add(params.max_tokens);
        self.throttle.acquire(estimated_tokens).await;

        let started = Instant::now();
        let completion = self.gateway.complete(&request).await?;
        let duration_ms = started.elapsed().as_millis() as i64;

        let story = parse_story(&completion.text)?;

        let cost_usd = self.config.pricing.cost_usd(tier, completion.usage);
        let readability = scoring::readability(&story.cat_story, complexity);
        let quality = scoring::quality_metrics(
            &story.cat_story,
            source_text,
            &story.key_concepts,
            complexity,
        );

        Ok(GenerationOutcome {
            story,
            tokens_used: completion.usage.total_tokens as i32,
            cost_usd,
            duration_ms,
            readability,
            quality,
        })
    }
}

/// Extracted text of a `completed` document, if any.
fn processable_source(document: &Document) -> Option<&str> {
    if document.status != DocumentStatus::Completed {
        return None;
    }
    document
        .extracted_content
        .as_deref()
        .filter(|t| !t.trim().is_empty())
}

/// Pulls the JSON object out of the raw completion text (models sometimes
/// wrap it in prose or code fences) and decodes it. Missing keys and broken
/// JSON are both terminal parse failures.
fn parse_story(raw: &str) -> Result<GeneratedStory, PipelineError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(GatewayError::new(
            GatewayErrorKind::Malformed,
            "response contains no JSON object",
        )
        .into());
    };
    if end < start {
        return Err(GatewayError::new(
            GatewayErrorKind::Malformed,
            "response contains no JSON object",
        )
        .into());
    }
    serde_json::from_str::<GeneratedStory>(&raw[start..=end]).map_err(|e| {
        GatewayError::new(
            GatewayErrorKind::Malformed,
            format!("Invalid JSON in response: {e}"),
        )
        .into()
    })
}
