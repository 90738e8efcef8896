//! services/worker/src/pipeline/document.rs
//!
//! Background extraction of an uploaded document: read the stored bytes,
//! pull structural metadata (best-effort), extract plain text, validate it,
//! and complete the document with text and statistics. Any failure after
//! the idempotency guard marks the document failed and re-raises so the
//! queue substrate's retry policy governs further attempts.

use crate::pipeline::PipelineError;
use cat_tales_core::domain::{ContentStats, Document};
use cat_tales_core::ports::{BlobStore, ContentExtractor, DocumentFormat, ExtractError, Store};
use cat_tales_core::validation;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct DocumentProcessingPipeline {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn ContentExtractor>,
}

impl DocumentProcessingPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Self {
        Self {
            store,
            blobs,
            extractor,
        }
    }

    /// Runs one extraction attempt for a document.
    ///
    /// Duplicate queue deliveries are absorbed here: a document that is not
    /// in a processable state is logged and skipped without touching it.
    pub async fn process(&self, document_id: Uuid) -> Result<(), PipelineError> {
        let mut document = self.store.get_document(document_id).await?;

        if !document.can_be_processed() {
            info!(
                %document_id,
                status = document.status.as_str(),
                "document is not processable, skipping (duplicate delivery?)"
            );
            return Ok(());
        }

        document.begin_processing()?;
        self.store.save_document(&document).await?;

        match self.run_extraction(&mut document).await {
            Ok(()) => {
                self.store.save_document(&document).await?;
                info!(
                    %document_id,
                    words = document
                        .content_stats
                        .as_ref()
                        .map(|s| s.word_count)
                        .unwrap_or(0),
                    "document extraction completed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(%document_id, error = %e, "document extraction failed");
                document.mark_failed(e.to_string());
                self.store.save_document(&document).await?;
                Err(e)
            }
        }
    }

    async fn run_extraction(&self, document: &mut Document) -> Result<(), PipelineError> {
        let bytes = self.blobs.read(&document.stored_path).await?;

        let format = DocumentFormat::detect(&document.mime_type, &document.original_filename)
            .ok_or_else(|| {
                ExtractError::UnsupportedFormat(format!(
                    "{} ({})",
                    document.mime_type, document.original_filename
                ))
            })?;

        // Metadata is a nice-to-have; a torn docProps part must not sink
        // the whole extraction.
        match self.extractor.extract_metadata(&bytes, format).await {
            Ok(meta) => {
                if let Some(title) = meta.title {
                    document.metadata.insert("title".into(), title);
                }
                if let Some(author) = meta.author {
                    document.metadata.insert("author".into(), author);
                }
                if let Some(pages) = meta.page_count {
                    document.metadata.insert("page_count".into(), pages.to_string());
                }
            }
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "metadata extraction failed, continuing");
            }
        }

        let text = self.extractor.extract_text(&bytes, format).await?;

        let report = validation::validate(&text);
        if !report.valid {
            return Err(PipelineError::Validation(report.issues.join("; ")));
        }

        let stats = ContentStats::from_text(&text);
        document.complete_extraction(text, stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cat_tales_core::domain::DocumentStatus;
    use cat_tales_core::ports::{BlobError, ExtractedMetadata, StoreError, StoreResult};
    use cat_tales_core::Simplification;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store; good enough for pipeline wiring tests.
    #[derive(Default)]
    struct MemStore {
        documents: Mutex<HashMap<Uuid, Document>>,
    }

    #[async_trait]
    impl Store for MemStore {
        async fn create_document(&self, document: &Document) -> StoreResult<()> {
            self.documents
                .lock()
                .unwrap()
                .insert(document.id, document.clone());
            Ok(())
        }

        async fn get_document(&self, id: Uuid) -> StoreResult<Document> {
            self.documents
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("document {id}")))
        }

        async fn save_document(&self, document: &Document) -> StoreResult<()> {
            self.documents
                .lock()
                .unwrap()
                .insert(document.id, document.clone());
            Ok(())
        }

        async fn find_document_by_hash(
            &self,
            user_id: Uuid,
            file_hash: &str,
        ) -> StoreResult<Option<Document>> {
            Ok(self
                .documents
                .lock()
                .unwrap()
                .values()
                .find(|d| d.user_id == user_id && d.file_hash == file_hash)
                .cloned())
        }

        async fn create_simplification(&self, _s: &Simplification) -> StoreResult<()> {
            unimplemented!("not used by document pipeline tests")
        }

        async fn get_simplification(&self, id: Uuid) -> StoreResult<Simplification> {
            Err(StoreError::NotFound(format!("simplification {id}")))
        }

        async fn save_simplification(&self, _s: &Simplification) -> StoreResult<()> {
            unimplemented!("not used by document pipeline tests")
        }
    }

    struct MemBlobs;

    #[async_trait]
    impl BlobStore for MemBlobs {
        async fn exists(&self, _path: &str) -> Result<bool, BlobError> {
            Ok(true)
        }
        async fn read(&self, _path: &str) -> Result<Vec<u8>, BlobError> {
            Ok(b"%PDF-1.4 fake bytes".to_vec())
        }
        async fn write(&self, _path: &str, _bytes: &[u8]) -> Result<(), BlobError> {
            Ok(())
        }
        async fn delete(&self, _path: &str) -> Result<bool, BlobError> {
            Ok(true)
        }
    }

    /// Scripted extractor that counts invocations.
    struct FakeExtractor {
        text: Result<String, &'static str>,
        calls: AtomicUsize,
    }

    impl FakeExtractor {
        fn returning(text: &str) -> Self {
            Self {
                text: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(detail: &'static str) -> Self {
            Self {
                text: Err(detail),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentExtractor for FakeExtractor {
        async fn extract_text(
            &self,
            _bytes: &[u8],
            _format: DocumentFormat,
        ) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text.clone().map_err(|detail| ExtractError::Parse {
                format: "pdf",
                detail: detail.to_string(),
            })
        }

        async fn extract_metadata(
            &self,
            _bytes: &[u8],
            _format: DocumentFormat,
        ) -> Result<ExtractedMetadata, ExtractError> {
            Ok(ExtractedMetadata {
                title: Some("Sample Paper".into()),
                author: None,
                page_count: Some(3),
            })
        }
    }

    const GOOD_TEXT: &str = "This is a perfectly reasonable document about physics. \
        It has enough words to pass validation. Momentum is the product of mass \
        and velocity, and it is conserved in closed systems.";

    fn seed_document(store: &MemStore) -> Uuid {
        let doc = Document::new_upload(
            Uuid::new_v4(),
            "paper.pdf".into(),
            "blobs/ab/abc123".into(),
            "application/pdf".into(),
            9_000,
            "abc123".into(),
        );
        let id = doc.id;
        store.documents.lock().unwrap().insert(id, doc);
        id
    }

    fn pipeline(
        store: Arc<MemStore>,
        extractor: Arc<FakeExtractor>,
    ) -> DocumentProcessingPipeline {
        DocumentProcessingPipeline::new(store, Arc::new(MemBlobs), extractor)
    }

    #[tokio::test]
    async fn successful_extraction_completes_with_stats_and_metadata() {
        let store = Arc::new(MemStore::default());
        let extractor = Arc::new(FakeExtractor::returning(GOOD_TEXT));
        let id = seed_document(&store);

        pipeline(store.clone(), extractor).process(id).await.unwrap();

        let doc = store.get_document(id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.extracted_content.as_deref(), Some(GOOD_TEXT));
        let stats = doc.content_stats.unwrap();
        assert!(stats.word_count > 20);
        assert_eq!(stats.reading_minutes, 1);
        assert_eq!(doc.metadata.get("title").map(String::as_str), Some("Sample Paper"));
        assert_eq!(doc.metadata.get("page_count").map(String::as_str), Some("3"));
        assert!(doc.processed_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_absorbed_without_reextracting() {
        let store = Arc::new(MemStore::default());
        let extractor = Arc::new(FakeExtractor::returning(GOOD_TEXT));
        let id = seed_document(&store);
        let pipeline = pipeline(store.clone(), extractor.clone());

        pipeline.process(id).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        // Second delivery of the same job: clean no-op.
        pipeline.process(id).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        let doc = store.get_document(id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn extractor_failure_marks_failed_and_reraises() {
        let store = Arc::new(MemStore::default());
        let extractor = Arc::new(FakeExtractor::failing("bad xref table"));
        let id = seed_document(&store);

        let err = pipeline(store.clone(), extractor)
            .process(id)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extract(_)));

        let doc = store.get_document(id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        // Failed documents stay processable for the next retry attempt.
        assert!(doc.can_be_processed());
        let message = doc.processing_error.unwrap();
        assert!(message.contains("bad xref table"), "got: {message}");
    }

    #[tokio::test]
    async fn invalid_content_fails_with_joined_issues() {
        let store = Arc::new(MemStore::default());
        // 40 chars, few words: trips both the word-count and length rules.
        let extractor = Arc::new(FakeExtractor::returning("Short garbled text, not a document."));
        let id = seed_document(&store);

        let err = pipeline(store.clone(), extractor)
            .process(id)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let doc = store.get_document(id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        let message = doc.processing_error.unwrap();
        assert!(message.contains("too few words"), "got: {message}");
        assert!(message.contains("; "), "issues are joined: {message}");
    }

    #[tokio::test]
    async fn unsupported_format_is_fatal() {
        let store = Arc::new(MemStore::default());
        let extractor = Arc::new(FakeExtractor::returning(GOOD_TEXT));
        let mut doc = Document::new_upload(
            Uuid::new_v4(),
            "notes.txt".into(),
            "blobs/cd/cdef".into(),
            "text/plain".into(),
            500,
            "cdef".into(),
        );
        doc.status = DocumentStatus::Uploaded;
        let id = doc.id;
        store.documents.lock().unwrap().insert(id, doc);

        let err = pipeline(store.clone(), extractor)
            .process(id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Extract(ExtractError::UnsupportedFormat(_))
        ));
        let doc = store.get_document(id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
    }
}
