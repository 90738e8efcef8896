//! crates/cat_tales_core/src/lib.rs
//!
//! The processing core: domain state machines, generation parameters,
//! quality heuristics, and the ports the worker service implements. This
//! crate has no I/O of its own.

pub mod domain;
pub mod llm;
pub mod params;
pub mod ports;
pub mod scoring;
pub mod validation;

pub use domain::{
    Complexity, ContentStats, Document, DocumentStatus, GeneratedStory, GenerationOutcome,
    ModelTier, QualityMetrics, Simplification, SimplificationStatus, TransitionError,
};
pub use llm::{Completion, CompletionRequest, GatewayError, GatewayErrorKind, TokenUsage};
pub use params::{GenerationParams, Lane, PricingTable};
pub use ports::{
    BlobError, BlobStore, ContentExtractor, DocumentFormat, ExtractError, ExtractedMetadata, Job,
    JobQueue, LlmGateway, QueueError, Store, StoreError, StoreResult, Throttle,
};
