//! services/worker/src/pipeline/mod.rs
//!
//! The two background pipelines: document extraction and story generation.
//! Each is a plain struct over the core ports, invoked by the queue workers
//! with nothing but an entity id.

pub mod document;
pub mod prompt;
pub mod simplify;

pub use document::DocumentProcessingPipeline;
pub use simplify::SimplificationOrchestrator;

use crate::queue::JobRunner;
use async_trait::async_trait;
use cat_tales_core::domain::{DocumentStatus, SimplificationStatus, TransitionError};
use cat_tales_core::llm::GatewayError;
use cat_tales_core::ports::{BlobError, ExtractError, Job, Store, StoreError};
use std::sync::Arc;
use tracing::error;

/// A failed pipeline attempt. Variants carry the port error verbatim so the
/// logs keep the technical detail; what the user sees is decided at the
/// point the entity is marked failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("extracted content failed validation: {0}")]
    Validation(String),
}

impl PipelineError {
    /// Whether a further queue-substrate attempt could plausibly succeed.
    /// Infrastructure hiccups are retryable; deterministic failures
    /// (unparseable documents, invalid content, rejected prompts) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(_) | Self::Blob(_) => true,
            Self::Gateway(e) => e.is_retryable(),
            Self::Extract(_) | Self::Transition(_) | Self::Validation(_) => false,
        }
    }
}

/// Dispatches queue jobs to the two pipelines and re-asserts `failed` once
/// the queue substrate gives up on a job, so no entity reports `processing`
/// after its retries are exhausted.
pub struct PipelineRunner {
    documents: DocumentProcessingPipeline,
    simplifications: SimplificationOrchestrator,
    store: Arc<dyn Store>,
}

impl PipelineRunner {
    pub fn new(
        documents: DocumentProcessingPipeline,
        simplifications: SimplificationOrchestrator,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            documents,
            simplifications,
            store,
        }
    }
}

const ABANDONED_MESSAGE: &str = "Processing was abandoned after repeated failures.";

#[async_trait]
impl JobRunner for PipelineRunner {
    async fn run(&self, job: Job) -> Result<(), PipelineError> {
        match job {
            Job::ProcessDocument { document_id } => self.documents.process(document_id).await,
            Job::GenerateSimplification { simplification_id } => {
                self.simplifications.generate(simplification_id).await
            }
        }
    }

    async fn on_permanent_failure(&self, job: Job, failure: Option<&PipelineError>) {
        let message = failure
            .map(|e| e.to_string())
            .unwrap_or_else(|| ABANDONED_MESSAGE.to_string());
        let result = match job {
            Job::ProcessDocument { document_id } => {
                park_document(self.store.as_ref(), document_id, &message).await
            }
            Job::GenerateSimplification { simplification_id } => {
                park_simplification(self.store.as_ref(), simplification_id, &message).await
            }
        };
        if let Err(e) = result {
            error!(
                kind = job.kind(),
                entity = %job.entity_id(),
                error = %e,
                "failed to record permanent job failure"
            );
        }
    }
}

async fn park_document(store: &dyn Store, id: uuid::Uuid, message: &str) -> Result<(), StoreError> {
    let mut document = store.get_document(id).await?;
    // A duplicate delivery may have completed the work; never regress it.
    if document.status == DocumentStatus::Completed {
        return Ok(());
    }
    document.mark_failed(message);
    store.save_document(&document).await
}

async fn park_simplification(
    store: &dyn Store,
    id: uuid::Uuid,
    message: &str,
) -> Result<(), StoreError> {
    let mut simplification = store.get_simplification(id).await?;
    if simplification.status == SimplificationStatus::Completed {
        return Ok(());
    }
    simplification.mark_failed(message);
    store.save_simplification(&simplification).await
}
