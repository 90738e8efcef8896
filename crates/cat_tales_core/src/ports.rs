//! crates/cat_tales_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the processing core. These
//! traits form the boundary of the hexagonal architecture: the pipelines
//! depend only on what is declared here, never on sqlx, the OpenAI client,
//! or the filesystem directly.

use crate::domain::{Document, Simplification};
use crate::llm::{Completion, CompletionRequest, GatewayError};
use crate::params::Lane;
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Persistence
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Unexpected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence port for documents and simplifications. Implementations
/// store full rows; the state machines live in the domain, not in SQL.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_document(&self, document: &Document) -> StoreResult<()>;
    async fn get_document(&self, id: Uuid) -> StoreResult<Document>;
    async fn save_document(&self, document: &Document) -> StoreResult<()>;
    /// Duplicate-upload lookup: same user, same content hash.
    async fn find_document_by_hash(
        &self,
        user_id: Uuid,
        file_hash: &str,
    ) -> StoreResult<Option<Document>>;

    async fn create_simplification(&self, simplification: &Simplification) -> StoreResult<()>;
    async fn get_simplification(&self, id: Uuid) -> StoreResult<Simplification>;
    async fn save_simplification(&self, simplification: &Simplification) -> StoreResult<()>;
}

//=========================================================================================
// Blob storage
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob storage error: {0}")]
    Io(String),
}

/// Raw document bytes, keyed by the stored path recorded on the document.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, BlobError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError>;
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError>;
    async fn delete(&self, path: &str) -> Result<bool, BlobError>;
}

//=========================================================================================
// Content extraction
//=========================================================================================

/// The document formats the extraction pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
}

impl DocumentFormat {
    /// Resolves a format from the declared mime type, falling back to the
    /// filename extension. Anything else is unsupported and fatal.
    pub fn detect(mime_type: &str, filename: &str) -> Option<Self> {
        match mime_type {
            "application/pdf" => return Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                return Some(Self::Docx)
            }
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                return Some(Self::Pptx)
            }
            _ => {}
        }
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".docx") {
            Some(Self::Docx)
        } else if lower.ends_with(".pptx") {
            Some(Self::Pptx)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse {format} content: {detail}")]
    Parse { format: &'static str, detail: String },
    #[error("document produced no text")]
    Empty,
}

/// Structural metadata gathered alongside the text, best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Page count for PDF/DOCX, slide count for PPTX.
    pub page_count: Option<usize>,
}

/// Format-specific text extraction over raw document bytes.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Produces normalized UTF-8 plain text. Failure here is fatal to the
    /// processing attempt.
    async fn extract_text(&self, bytes: &[u8], format: DocumentFormat)
        -> Result<String, ExtractError>;

    /// Produces structural metadata. Callers treat failure as non-fatal.
    async fn extract_metadata(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<ExtractedMetadata, ExtractError>;
}

//=========================================================================================
// LLM gateway and throttle
//=========================================================================================

/// Stateless wrapper around the external completion API. No retry logic
/// lives here; transient-fault handling belongs to the queue substrate.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, GatewayError>;
}

/// Process-wide request/token budget the orchestrator must consult before
/// each gateway call. Implementations block until capacity is available.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn acquire(&self, estimated_tokens: u32);
}

//=========================================================================================
// Queue substrate
//=========================================================================================

/// A unit of background work. The id doubles as the idempotency key: the
/// pipelines absorb duplicate deliveries by checking entity state first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    ProcessDocument { document_id: Uuid },
    GenerateSimplification { simplification_id: Uuid },
}

impl Job {
    /// The entity id this job operates on.
    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::ProcessDocument { document_id } => *document_id,
            Self::GenerateSimplification { simplification_id } => *simplification_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessDocument { .. } => "process_document",
            Self::GenerateSimplification { .. } => "generate_simplification",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue '{0}' is closed")]
    Closed(&'static str),
}

/// Enqueue-only view of the queue substrate, as seen by producers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job, lane: Lane) -> Result<(), QueueError>;
}
