//! crates/cat_tales_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application: documents,
//! simplifications, their status machines, and the read models exposed to
//! polling clients. These structs are independent of any database or
//! serialization format; every status transition goes through a method here
//! so illegal transitions are unrepresentable at call sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Raised when a caller asks for a status transition the state machine does
/// not permit (e.g. processing a document that is already completed).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot {action} a {entity} in status '{status}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub action: &'static str,
    pub status: &'static str,
}

//=========================================================================================
// Document
//=========================================================================================

/// Lifecycle status of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown document status '{other}'")),
        }
    }
}

/// Statistics computed from the extracted plain text of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStats {
    pub word_count: usize,
    pub character_count: usize,
    pub paragraph_count: usize,
    /// Estimated reading time at ~200 words per minute, never below 1.
    pub reading_minutes: u32,
}

impl ContentStats {
    /// Computes statistics for a block of extracted text.
    pub fn from_text(text: &str) -> Self {
        let word_count = text.split_whitespace().count();
        let paragraph_count = text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count()
            .max(1);
        Self {
            word_count,
            character_count: text.chars().count(),
            paragraph_count,
            reading_minutes: reading_minutes(word_count),
        }
    }
}

/// Estimated reading time in minutes for a word count (200 wpm, floor 1).
pub fn reading_minutes(word_count: usize) -> u32 {
    ((word_count as f64 / 200.0).round() as u32).max(1)
}

/// An uploaded document together with its extraction state.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// SHA-256 of the raw upload; unique per user for duplicate detection.
    pub file_hash: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Free-form structural metadata gathered during extraction
    /// (title, author, page/slide count).
    pub metadata: HashMap<String, String>,
    pub extracted_content: Option<String>,
    pub content_stats: Option<ContentStats>,
    pub status: DocumentStatus,
    pub processing_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a freshly uploaded document in status `uploaded`.
    pub fn new_upload(
        user_id: Uuid,
        original_filename: String,
        stored_path: String,
        mime_type: String,
        size_bytes: i64,
        file_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            original_filename,
            stored_path,
            mime_type,
            size_bytes,
            file_hash,
            title: None,
            description: None,
            metadata: HashMap::new(),
            extracted_content: None,
            content_stats: None,
            status: DocumentStatus::Uploaded,
            processing_error: None,
            processed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the extraction pipeline may pick this document up.
    ///
    /// Only `uploaded` and `failed` documents are processable; this doubles
    /// as the idempotency guard against duplicate queue deliveries.
    pub fn can_be_processed(&self) -> bool {
        matches!(
            self.status,
            DocumentStatus::Uploaded | DocumentStatus::Failed
        )
    }

    /// `uploaded`/`failed` → `processing`. Clears any prior error.
    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        if !self.can_be_processed() {
            return Err(self.transition_error("process"));
        }
        self.status = DocumentStatus::Processing;
        self.processing_error = None;
        self.touch();
        Ok(())
    }

    /// `processing` → `completed`, persisting extracted text and statistics.
    pub fn complete_extraction(&mut self, text: String, stats: ContentStats) {
        self.extracted_content = Some(text);
        self.content_stats = Some(stats);
        self.status = DocumentStatus::Completed;
        self.processing_error = None;
        self.processed_at = Some(Utc::now());
        self.touch();
    }

    /// Any state → `failed` with an error message. Also re-asserted by the
    /// queue substrate's permanent-failure hook after retry exhaustion, so
    /// a document never reports `processing` once the queue has given up.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = DocumentStatus::Failed;
        self.processing_error = Some(error.into());
        self.touch();
    }

    /// User-triggered reset of a failed document back to `uploaded` so it
    /// can be re-enqueued.
    pub fn reprocess(&mut self) -> Result<(), TransitionError> {
        if self.status != DocumentStatus::Failed {
            return Err(self.transition_error("reprocess"));
        }
        self.status = DocumentStatus::Uploaded;
        self.processing_error = None;
        self.touch();
        Ok(())
    }

    /// Terminal state → `archived`.
    pub fn archive(&mut self) -> Result<(), TransitionError> {
        match self.status {
            DocumentStatus::Completed | DocumentStatus::Failed => {
                self.status = DocumentStatus::Archived;
                self.touch();
                Ok(())
            }
            _ => Err(self.transition_error("archive")),
        }
    }

    /// `archived` → `completed` when content was extracted, otherwise back
    /// to `uploaded` so the document can be processed again.
    pub fn restore(&mut self) -> Result<(), TransitionError> {
        if self.status != DocumentStatus::Archived {
            return Err(self.transition_error("restore"));
        }
        self.status = if self.extracted_content.is_some() {
            DocumentStatus::Completed
        } else {
            DocumentStatus::Uploaded
        };
        self.touch();
        Ok(())
    }

    /// Soft delete; the row survives but is hidden from normal reads.
    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.touch();
    }

    /// Read model for polling UIs.
    pub fn status_view(&self) -> DocumentStatusView {
        DocumentStatusView {
            id: self.id,
            status: self.status,
            is_processing: self.status == DocumentStatus::Processing,
            is_completed: self.status == DocumentStatus::Completed,
            has_failed: self.status == DocumentStatus::Failed,
            error: self.processing_error.clone(),
            processed_at: self.processed_at,
            stats: self.content_stats.clone(),
        }
    }

    fn transition_error(&self, action: &'static str) -> TransitionError {
        TransitionError {
            entity: "document",
            action,
            status: self.status.as_str(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Snapshot of a document's processing state, for status polling.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatusView {
    pub id: Uuid,
    pub status: DocumentStatus,
    pub is_processing: bool,
    pub is_completed: bool,
    pub has_failed: bool,
    pub error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub stats: Option<ContentStats>,
}

//=========================================================================================
// Simplification
//=========================================================================================

/// The two LLM model classes offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Cheap and quick; default for most requests.
    Fast,
    /// Larger context and better prose, at a much higher per-token price.
    Advanced,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown model tier '{other}'")),
        }
    }
}

/// Target audience / difficulty for the generated story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Basic,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

/// Lifecycle status of a simplification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimplificationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SimplificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SimplificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown simplification status '{other}'")),
        }
    }
}

/// The structured payload the model is asked to return: exactly these four
/// keys, as JSON. A response missing any of them is a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub simplified_title: String,
    pub cat_story: String,
    pub summary: String,
    pub key_concepts: Vec<String>,
}

/// Heuristic quality scores for a generated story. All ratio scores are
/// clamped to [0, 1]; see the scoring module for the formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub coherence: f64,
    pub engagement: f64,
    pub accuracy: f64,
    pub creativity: f64,
    pub theme_consistency: f64,
    pub educational_value: f64,
    pub language_simplicity: f64,
    pub word_count: usize,
    pub reading_minutes: u32,
}

/// Everything the orchestrator persists when a generation succeeds.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub story: GeneratedStory,
    pub tokens_used: i32,
    pub cost_usd: f64,
    pub duration_ms: i64,
    pub readability: i16,
    pub quality: QualityMetrics,
}

/// A user's request to rewrite one document as a cat story.
#[derive(Debug, Clone)]
pub struct Simplification {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub model_tier: ModelTier,
    pub complexity: Complexity,
    pub generated_title: Option<String>,
    pub cat_story: Option<String>,
    pub summary: Option<String>,
    pub key_concepts: Option<Vec<String>>,
    pub status: SimplificationStatus,
    pub error: Option<String>,
    pub tokens_used: Option<i32>,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<i64>,
    /// 1–10 readability score, set on completion.
    pub readability: Option<i16>,
    pub quality: Option<QualityMetrics>,
    pub is_favorite: bool,
    pub rating: Option<i16>,
    pub feedback_notes: Option<String>,
    pub is_public: bool,
    pub share_token: Option<String>,
    pub download_count: i32,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Simplification {
    /// Creates a new pending request for a document.
    pub fn new_request(
        document_id: Uuid,
        user_id: Uuid,
        model_tier: ModelTier,
        complexity: Complexity,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            user_id,
            model_tier,
            complexity,
            generated_title: None,
            cat_story: None,
            summary: None,
            key_concepts: None,
            status: SimplificationStatus::Pending,
            error: None,
            tokens_used: None,
            cost_usd: None,
            duration_ms: None,
            readability: None,
            quality: None,
            is_favorite: false,
            rating: None,
            feedback_notes: None,
            is_public: false,
            share_token: None,
            download_count: 0,
            last_downloaded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `pending` → `processing`. Only pending requests may start; this is
    /// the idempotency guard against duplicate queue deliveries.
    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        if self.status != SimplificationStatus::Pending {
            return Err(self.transition_error("generate"));
        }
        self.status = SimplificationStatus::Processing;
        self.error = None;
        self.touch();
        Ok(())
    }

    /// `processing` → `completed`, persisting every generated field at once
    /// so they are all-or-nothing.
    pub fn complete_generation(&mut self, outcome: GenerationOutcome) {
        self.generated_title = Some(outcome.story.simplified_title);
        self.cat_story = Some(outcome.story.cat_story);
        self.summary = Some(outcome.story.summary);
        self.key_concepts = Some(outcome.story.key_concepts);
        self.tokens_used = Some(outcome.tokens_used);
        self.cost_usd = Some(outcome.cost_usd);
        self.duration_ms = Some(outcome.duration_ms);
        self.readability = Some(outcome.readability);
        self.quality = Some(outcome.quality);
        self.status = SimplificationStatus::Completed;
        self.error = None;
        self.touch();
    }

    /// Any state → `failed` with a user-facing message.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SimplificationStatus::Failed;
        self.error = Some(error.into());
        self.touch();
    }

    /// User-triggered reset of a failed request back to `pending`.
    /// Regenerating a completed or in-flight request is rejected.
    pub fn regenerate(&mut self) -> Result<(), TransitionError> {
        if self.status != SimplificationStatus::Failed {
            return Err(self.transition_error("regenerate"));
        }
        self.status = SimplificationStatus::Pending;
        self.error = None;
        self.generated_title = None;
        self.cat_story = None;
        self.summary = None;
        self.key_concepts = None;
        self.readability = None;
        self.quality = None;
        self.touch();
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // User feedback actions — allowed on completed records, no status change.
    //-------------------------------------------------------------------------------------

    pub fn toggle_favorite(&mut self) {
        self.is_favorite = !self.is_favorite;
        self.touch();
    }

    /// Stores a rating, clamped to the 1–5 scale.
    pub fn rate(&mut self, rating: i16, notes: Option<String>) {
        self.rating = Some(rating.clamp(1, 5));
        if notes.is_some() {
            self.feedback_notes = notes;
        }
        self.touch();
    }

    /// Makes the story publicly readable under an unguessable token.
    /// The token is minted by the caller; `share_token` is non-null iff
    /// `is_public`.
    pub fn publish(&mut self, share_token: String) -> Result<(), TransitionError> {
        if self.status != SimplificationStatus::Completed {
            return Err(self.transition_error("publish"));
        }
        self.is_public = true;
        self.share_token = Some(share_token);
        self.touch();
        Ok(())
    }

    pub fn unpublish(&mut self) {
        self.is_public = false;
        self.share_token = None;
        self.touch();
    }

    pub fn record_download(&mut self) {
        self.download_count += 1;
        self.last_downloaded_at = Some(Utc::now());
        self.touch();
    }

    /// Read model for polling UIs.
    pub fn status_view(&self) -> SimplificationStatusView {
        SimplificationStatusView {
            id: self.id,
            document_id: self.document_id,
            status: self.status,
            is_processing: self.status == SimplificationStatus::Processing,
            is_completed: self.status == SimplificationStatus::Completed,
            has_failed: self.status == SimplificationStatus::Failed,
            error: self.error.clone(),
            readability: self.readability,
            quality: self.quality.clone(),
        }
    }

    fn transition_error(&self, action: &'static str) -> TransitionError {
        TransitionError {
            entity: "simplification",
            action,
            status: self.status.as_str(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Snapshot of a simplification's state, for status polling.
#[derive(Debug, Clone, Serialize)]
pub struct SimplificationStatusView {
    pub id: Uuid,
    pub document_id: Uuid,
    pub status: SimplificationStatus,
    pub is_processing: bool,
    pub is_completed: bool,
    pub has_failed: bool,
    pub error: Option<String>,
    pub readability: Option<i16>,
    pub quality: Option<QualityMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Document {
        Document::new_upload(
            Uuid::new_v4(),
            "paper.pdf".into(),
            "blobs/abc".into(),
            "application/pdf".into(),
            15_000,
            "deadbeef".into(),
        )
    }

    fn sample_outcome() -> GenerationOutcome {
        GenerationOutcome {
            story: GeneratedStory {
                simplified_title: "Whiskers Learns Physics".into(),
                cat_story: "Once there was a cat...".into(),
                summary: "A cat explains momentum.".into(),
                key_concepts: vec!["momentum".into()],
            },
            tokens_used: 900,
            cost_usd: 0.0031,
            duration_ms: 4210,
            readability: 9,
            quality: QualityMetrics {
                coherence: 0.8,
                engagement: 0.7,
                accuracy: 0.9,
                creativity: 0.6,
                theme_consistency: 0.8,
                educational_value: 0.7,
                language_simplicity: 0.9,
                word_count: 120,
                reading_minutes: 1,
            },
        }
    }

    #[test]
    fn document_happy_path_keeps_content_iff_completed() {
        let mut doc = sample_document();
        assert!(doc.extracted_content.is_none());
        doc.begin_processing().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
        doc.complete_extraction("hello world".into(), ContentStats::from_text("hello world"));
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert!(doc.extracted_content.is_some());
        assert!(doc.processed_at.is_some());
        assert!(doc.processing_error.is_none());
    }

    #[test]
    fn completed_document_cannot_reenter_processing() {
        let mut doc = sample_document();
        doc.begin_processing().unwrap();
        doc.complete_extraction("text".into(), ContentStats::from_text("text"));
        assert!(!doc.can_be_processed());
        assert!(doc.begin_processing().is_err());
    }

    #[test]
    fn failed_document_is_reprocessable() {
        let mut doc = sample_document();
        doc.begin_processing().unwrap();
        doc.mark_failed("parser exploded");
        assert!(doc.can_be_processed());
        doc.reprocess().unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert!(doc.processing_error.is_none());
    }

    #[test]
    fn restore_depends_on_extracted_content() {
        let mut with_content = sample_document();
        with_content.begin_processing().unwrap();
        with_content.complete_extraction("text".into(), ContentStats::from_text("text"));
        with_content.archive().unwrap();
        with_content.restore().unwrap();
        assert_eq!(with_content.status, DocumentStatus::Completed);

        let mut without_content = sample_document();
        without_content.begin_processing().unwrap();
        without_content.mark_failed("boom");
        without_content.archive().unwrap();
        without_content.restore().unwrap();
        assert_eq!(without_content.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn generated_fields_are_all_or_nothing() {
        let mut s = Simplification::new_request(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ModelTier::Fast,
            Complexity::Basic,
        );
        assert!(s.generated_title.is_none());
        assert!(s.cat_story.is_none());
        assert!(s.summary.is_none());
        assert!(s.key_concepts.is_none());

        s.begin_processing().unwrap();
        s.complete_generation(sample_outcome());
        assert_eq!(s.status, SimplificationStatus::Completed);
        assert!(s.generated_title.is_some());
        assert!(s.cat_story.is_some());
        assert!(s.summary.is_some());
        assert!(s.key_concepts.is_some());
    }

    #[test]
    fn regenerate_only_from_failed() {
        let mut s = Simplification::new_request(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ModelTier::Fast,
            Complexity::Basic,
        );
        s.begin_processing().unwrap();
        s.mark_failed("the AI service is busy");
        s.regenerate().unwrap();
        assert_eq!(s.status, SimplificationStatus::Pending);
        assert!(s.error.is_none());

        s.begin_processing().unwrap();
        s.complete_generation(sample_outcome());
        assert!(s.regenerate().is_err());
    }

    #[test]
    fn rating_is_clamped() {
        let mut s = Simplification::new_request(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ModelTier::Fast,
            Complexity::Basic,
        );
        s.rate(9, None);
        assert_eq!(s.rating, Some(5));
        s.rate(-3, Some("meh".into()));
        assert_eq!(s.rating, Some(1));
        assert_eq!(s.feedback_notes.as_deref(), Some("meh"));
    }

    #[test]
    fn share_token_tracks_is_public() {
        let mut s = Simplification::new_request(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ModelTier::Fast,
            Complexity::Basic,
        );
        // Publishing an incomplete story is rejected.
        assert!(s.publish("tok".into()).is_err());

        s.begin_processing().unwrap();
        s.complete_generation(sample_outcome());
        s.publish("a1b2c3".into()).unwrap();
        assert!(s.is_public && s.share_token.is_some());
        s.unpublish();
        assert!(!s.is_public && s.share_token.is_none());
    }

    #[test]
    fn reading_minutes_has_floor_of_one() {
        assert_eq!(reading_minutes(0), 1);
        assert_eq!(reading_minutes(90), 1);
        assert_eq!(reading_minutes(700), 4);
    }
}
