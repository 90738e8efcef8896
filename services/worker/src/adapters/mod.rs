//! services/worker/src/adapters/mod.rs
//!
//! Concrete implementations of the core ports: Postgres persistence,
//! filesystem blob storage, OpenAI-backed generation, office-format text
//! extraction, and the shared request/token throttle.

pub mod blob;
pub mod db;
pub mod extract;
pub mod llm;
pub mod throttle;

pub use blob::{content_hash, FsBlobStore};
pub use db::DbStore;
pub use extract::FormatExtractor;
pub use llm::OpenAiGatewayAdapter;
pub use throttle::RateBudget;
