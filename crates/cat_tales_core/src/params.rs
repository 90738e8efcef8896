//! crates/cat_tales_core/src/params.rs
//!
//! Generation parameters, context budgeting, pricing, and queue-lane
//! selection. All of these are pure functions over enumerated inputs —
//! an unknown complexity or tier is a compile error, not a silent default —
//! and the pricing/context tables are injected rather than read from
//! globals so environments can override them.

use crate::domain::{Complexity, ModelTier};
use crate::llm::TokenUsage;
use serde::{Deserialize, Serialize};

/// Tokens reserved for the system prompt and instruction block when
/// budgeting how much source text fits into a request.
const PROMPT_OVERHEAD_TOKENS: u32 = 800;

/// Rough chars-per-token ratio used to convert the token budget into a
/// character budget for truncation.
const CHARS_PER_TOKEN: u32 = 3;

/// Never hand the model less than this much source text, even for tiny
/// context windows.
const MIN_SOURCE_CHARS: usize = 1000;

/// Hard ceiling on completion tokens regardless of tier.
const MAX_COMPLETION_TOKENS: u32 = 4000;

/// Marker appended to source text that had to be cut to fit the window.
pub const TRUNCATION_MARKER: &str = "...";

/// Sampling parameters for one completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl GenerationParams {
    /// Derives the parameter set for a request: a fixed table per
    /// complexity level, with the advanced tier granted 20% more
    /// completion tokens (capped at 4000).
    pub fn for_request(complexity: Complexity, tier: ModelTier) -> Self {
        let (temperature, max_tokens, top_p) = match complexity {
            Complexity::Basic => (0.6, 1500, 0.9),
            Complexity::Intermediate => (0.7, 2000, 0.9),
            Complexity::Advanced => (0.8, 2500, 0.95),
        };
        let max_tokens = match tier {
            ModelTier::Fast => max_tokens,
            ModelTier::Advanced => {
                (((max_tokens as f64) * 1.2) as u32).min(MAX_COMPLETION_TOKENS)
            }
        };
        Self {
            temperature,
            max_tokens,
            top_p,
            frequency_penalty: 0.1,
            presence_penalty: 0.1,
        }
    }
}

//=========================================================================================
// Context budgeting
//=========================================================================================

/// How many characters of source text fit alongside the prompt overhead and
/// the completion budget in a model's context window. Floor of 1000 chars.
pub fn available_source_chars(context_window_tokens: u32, max_completion_tokens: u32) -> usize {
    let input_tokens = context_window_tokens
        .saturating_sub(PROMPT_OVERHEAD_TOKENS)
        .saturating_sub(max_completion_tokens);
    ((input_tokens * CHARS_PER_TOKEN) as usize).max(MIN_SOURCE_CHARS)
}

/// Truncates source text to the budget, appending an ellipsis marker when
/// anything was cut. Cuts on a char boundary.
pub fn truncate_source(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

//=========================================================================================
// Pricing
//=========================================================================================

/// Per-1K-token rates for one model tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRates {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Injected pricing table; defaults match the published rates for the two
/// tiers but deployments can override them through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    pub fast: TierRates,
    pub advanced: TierRates,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            fast: TierRates {
                input_per_1k: 0.0015,
                output_per_1k: 0.002,
            },
            advanced: TierRates {
                input_per_1k: 0.03,
                output_per_1k: 0.06,
            },
        }
    }
}

impl PricingTable {
    pub fn rates(&self, tier: ModelTier) -> TierRates {
        match tier {
            ModelTier::Fast => self.fast,
            ModelTier::Advanced => self.advanced,
        }
    }

    /// Monetary cost of one completion, from reported token usage.
    pub fn cost_usd(&self, tier: ModelTier, usage: TokenUsage) -> f64 {
        let rates = self.rates(tier);
        (usage.prompt_tokens as f64 / 1000.0) * rates.input_per_1k
            + (usage.completion_tokens as f64 / 1000.0) * rates.output_per_1k
    }
}

//=========================================================================================
// Queue lanes
//=========================================================================================

/// Documents at or above this size go to the heavy lane so slow extractions
/// don't block the default lane.
pub const HEAVY_DOCUMENT_BYTES: i64 = 5 * 1024 * 1024;

/// A named queue partition. Typed here; the substrate maps lanes to its own
/// string queue names at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Ordinary document extraction.
    Default,
    /// Large-document extraction, isolated from the default lane.
    Heavy,
    /// Fast-tier AI generation.
    AiDefault,
    /// Advanced-tier AI generation; scaled independently so expensive
    /// requests don't starve cheap ones.
    AiPriority,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Heavy => "heavy",
            Self::AiDefault => "ai",
            Self::AiPriority => "ai-priority",
        }
    }
}

/// Lane for a document-extraction job, by upload size.
pub fn select_document_lane(size_bytes: i64) -> Lane {
    if size_bytes >= HEAVY_DOCUMENT_BYTES {
        Lane::Heavy
    } else {
        Lane::Default
    }
}

/// Lane for a generation job, by requested model tier.
pub fn select_simplification_lane(tier: ModelTier) -> Lane {
    match tier {
        ModelTier::Fast => Lane::AiDefault,
        ModelTier::Advanced => Lane::AiPriority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_table_matches_complexity_levels() {
        let basic = GenerationParams::for_request(Complexity::Basic, ModelTier::Fast);
        assert_eq!(basic.temperature, 0.6);
        assert_eq!(basic.max_tokens, 1500);
        assert_eq!(basic.top_p, 0.9);

        let mid = GenerationParams::for_request(Complexity::Intermediate, ModelTier::Fast);
        assert_eq!(mid.temperature, 0.7);
        assert_eq!(mid.max_tokens, 2000);

        let adv = GenerationParams::for_request(Complexity::Advanced, ModelTier::Fast);
        assert_eq!(adv.temperature, 0.8);
        assert_eq!(adv.max_tokens, 2500);
        assert_eq!(adv.top_p, 0.95);
        assert_eq!(adv.frequency_penalty, 0.1);
        assert_eq!(adv.presence_penalty, 0.1);
    }

    #[test]
    fn advanced_tier_gets_twenty_percent_more_tokens_capped() {
        let basic = GenerationParams::for_request(Complexity::Basic, ModelTier::Advanced);
        assert_eq!(basic.max_tokens, 1800);

        // 2500 * 1.2 = 3000, still under the cap.
        let adv = GenerationParams::for_request(Complexity::Advanced, ModelTier::Advanced);
        assert_eq!(adv.max_tokens, 3000);
        assert!(adv.max_tokens <= 4000);
    }

    #[test]
    fn source_budget_has_a_floor() {
        // Window smaller than overhead + completion budget.
        assert_eq!(available_source_chars(2000, 1500), 1000);
        // 16385 - 800 - 1500 = 14085 tokens → 42255 chars.
        assert_eq!(available_source_chars(16_385, 1500), 42_255);
    }

    #[test]
    fn truncation_appends_marker_only_when_cut() {
        let short = truncate_source("hello", 10);
        assert_eq!(short, "hello");

        let long_input = "x".repeat(50_000);
        let limit = available_source_chars(16_385, 2500);
        let cut = truncate_source(&long_input, limit);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), limit + TRUNCATION_MARKER.len());
    }

    #[test]
    fn cost_uses_per_tier_rates() {
        let pricing = PricingTable::default();
        let usage = TokenUsage {
            prompt_tokens: 2000,
            completion_tokens: 1000,
            total_tokens: 3000,
        };
        let fast = pricing.cost_usd(ModelTier::Fast, usage);
        assert!((fast - (2.0 * 0.0015 + 1.0 * 0.002)).abs() < 1e-9);

        let advanced = pricing.cost_usd(ModelTier::Advanced, usage);
        assert!((advanced - (2.0 * 0.03 + 1.0 * 0.06)).abs() < 1e-9);
    }

    #[test]
    fn lanes_route_by_size_and_tier() {
        assert_eq!(select_document_lane(10_000), Lane::Default);
        assert_eq!(select_document_lane(5 * 1024 * 1024), Lane::Heavy);
        assert_eq!(select_simplification_lane(ModelTier::Fast), Lane::AiDefault);
        assert_eq!(
            select_simplification_lane(ModelTier::Advanced),
            Lane::AiPriority
        );
    }
}
