//! services/worker/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation
//! of the `Store` port from the `core` crate. It handles all interactions
//! with PostgreSQL using `sqlx`. JSON-shaped columns (metadata, stats,
//! quality metrics) are stored as text and decoded here; the state machine
//! itself lives in the domain, so this layer only reads and writes rows.

use async_trait::async_trait;
use cat_tales_core::domain::{
    ContentStats, Document, QualityMetrics, Simplification,
};
use cat_tales_core::ports::{Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// A database adapter that implements the `Store` port.
#[derive(Clone)]
pub struct DbStore {
    pool: PgPool,
}

impl DbStore {
    /// Creates a new `DbStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unexpected(e.to_string())
}

fn not_found(entity: &str, id: Uuid) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| match e {
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("{entity} {id} not found")),
        other => unexpected(other),
    }
}

//=========================================================================================
// "Impure" database record structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    original_filename: String,
    stored_path: String,
    mime_type: String,
    size_bytes: i64,
    file_hash: String,
    title: Option<String>,
    description: Option<String>,
    metadata: String,
    extracted_content: Option<String>,
    content_stats: Option<String>,
    status: String,
    processing_error: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    fn to_domain(self) -> StoreResult<Document> {
        let metadata: HashMap<String, String> =
            serde_json::from_str(&self.metadata).map_err(unexpected)?;
        let content_stats: Option<ContentStats> = self
            .content_stats
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(unexpected)?;
        Ok(Document {
            id: self.id,
            user_id: self.user_id,
            original_filename: self.original_filename,
            stored_path: self.stored_path,
            mime_type: self.mime_type,
            size_bytes: self.size_bytes,
            file_hash: self.file_hash,
            title: self.title,
            description: self.description,
            metadata,
            extracted_content: self.extracted_content,
            content_stats,
            status: FromStr::from_str(&self.status).map_err(StoreError::Unexpected)?,
            processing_error: self.processing_error,
            processed_at: self.processed_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SimplificationRecord {
    id: Uuid,
    document_id: Uuid,
    user_id: Uuid,
    model_tier: String,
    complexity: String,
    generated_title: Option<String>,
    cat_story: Option<String>,
    summary: Option<String>,
    key_concepts: Option<String>,
    status: String,
    error: Option<String>,
    tokens_used: Option<i32>,
    cost_usd: Option<f64>,
    duration_ms: Option<i64>,
    readability: Option<i16>,
    quality: Option<String>,
    is_favorite: bool,
    rating: Option<i16>,
    feedback_notes: Option<String>,
    is_public: bool,
    share_token: Option<String>,
    download_count: i32,
    last_downloaded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SimplificationRecord {
    fn to_domain(self) -> StoreResult<Simplification> {
        let key_concepts: Option<Vec<String>> = self
            .key_concepts
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(unexpected)?;
        let quality: Option<QualityMetrics> = self
            .quality
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(unexpected)?;
        Ok(Simplification {
            id: self.id,
            document_id: self.document_id,
            user_id: self.user_id,
            model_tier: FromStr::from_str(&self.model_tier).map_err(StoreError::Unexpected)?,
            complexity: FromStr::from_str(&self.complexity).map_err(StoreError::Unexpected)?,
            generated_title: self.generated_title,
            cat_story: self.cat_story,
            summary: self.summary,
            key_concepts,
            status: FromStr::from_str(&self.status).map_err(StoreError::Unexpected)?,
            error: self.error,
            tokens_used: self.tokens_used,
            cost_usd: self.cost_usd,
            duration_ms: self.duration_ms,
            readability: self.readability,
            quality,
            is_favorite: self.is_favorite,
            rating: self.rating,
            feedback_notes: self.feedback_notes,
            is_public: self.is_public,
            share_token: self.share_token,
            download_count: self.download_count,
            last_downloaded_at: self.last_downloaded_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, user_id, original_filename, stored_path, mime_type, \
    size_bytes, file_hash, title, description, metadata, extracted_content, content_stats, \
    status, processing_error, processed_at, deleted_at, created_at, updated_at";

const SIMPLIFICATION_COLUMNS: &str = "id, document_id, user_id, model_tier, complexity, \
    generated_title, cat_story, summary, key_concepts, status, error, tokens_used, cost_usd, \
    duration_ms, readability, quality, is_favorite, rating, feedback_notes, is_public, \
    share_token, download_count, last_downloaded_at, created_at, updated_at";

//=========================================================================================
// `Store` trait implementation
//=========================================================================================

#[async_trait]
impl Store for DbStore {
    async fn create_document(&self, document: &Document) -> StoreResult<()> {
        let metadata = serde_json::to_string(&document.metadata).map_err(unexpected)?;
        let content_stats = document
            .content_stats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO documents (id, user_id, original_filename, stored_path, mime_type, \
             size_bytes, file_hash, title, description, metadata, extracted_content, \
             content_stats, status, processing_error, processed_at, deleted_at, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(document.id)
        .bind(document.user_id)
        .bind(&document.original_filename)
        .bind(&document.stored_path)
        .bind(&document.mime_type)
        .bind(document.size_bytes)
        .bind(&document.file_hash)
        .bind(&document.title)
        .bind(&document.description)
        .bind(metadata)
        .bind(&document.extracted_content)
        .bind(content_stats)
        .bind(document.status.as_str())
        .bind(&document.processing_error)
        .bind(document.processed_at)
        .bind(document.deleted_at)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> StoreResult<Document> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND deleted_at IS NULL"
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("document", id))?;
        record.to_domain()
    }

    async fn save_document(&self, document: &Document) -> StoreResult<()> {
        let metadata = serde_json::to_string(&document.metadata).map_err(unexpected)?;
        let content_stats = document
            .content_stats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(unexpected)?;
        sqlx::query(
            "UPDATE documents SET title = $2, description = $3, metadata = $4, \
             extracted_content = $5, content_stats = $6, status = $7, processing_error = $8, \
             processed_at = $9, deleted_at = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(metadata)
        .bind(&document.extracted_content)
        .bind(content_stats)
        .bind(document.status.as_str())
        .bind(&document.processing_error)
        .bind(document.processed_at)
        .bind(document.deleted_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_document_by_hash(
        &self,
        user_id: Uuid,
        file_hash: &str,
    ) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE user_id = $1 AND file_hash = $2 AND deleted_at IS NULL"
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(user_id)
            .bind(file_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(DocumentRecord::to_domain).transpose()
    }

    async fn create_simplification(&self, simplification: &Simplification) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO simplifications (id, document_id, user_id, model_tier, complexity, \
             status, is_favorite, is_public, download_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(simplification.id)
        .bind(simplification.document_id)
        .bind(simplification.user_id)
        .bind(simplification.model_tier.as_str())
        .bind(simplification.complexity.as_str())
        .bind(simplification.status.as_str())
        .bind(simplification.is_favorite)
        .bind(simplification.is_public)
        .bind(simplification.download_count)
        .bind(simplification.created_at)
        .bind(simplification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_simplification(&self, id: Uuid) -> StoreResult<Simplification> {
        let sql = format!("SELECT {SIMPLIFICATION_COLUMNS} FROM simplifications WHERE id = $1");
        let record = sqlx::query_as::<_, SimplificationRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("simplification", id))?;
        record.to_domain()
    }

    async fn save_simplification(&self, simplification: &Simplification) -> StoreResult<()> {
        let key_concepts = simplification
            .key_concepts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(unexpected)?;
        let quality = simplification
            .quality
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(unexpected)?;
        sqlx::query(
            "UPDATE simplifications SET generated_title = $2, cat_story = $3, summary = $4, \
             key_concepts = $5, status = $6, error = $7, tokens_used = $8, cost_usd = $9, \
             duration_ms = $10, readability = $11, quality = $12, is_favorite = $13, \
             rating = $14, feedback_notes = $15, is_public = $16, share_token = $17, \
             download_count = $18, last_downloaded_at = $19, updated_at = $20 WHERE id = $1",
        )
        .bind(simplification.id)
        .bind(&simplification.generated_title)
        .bind(&simplification.cat_story)
        .bind(&simplification.summary)
        .bind(key_concepts)
        .bind(simplification.status.as_str())
        .bind(&simplification.error)
        .bind(simplification.tokens_used)
        .bind(simplification.cost_usd)
        .bind(simplification.duration_ms)
        .bind(simplification.readability)
        .bind(quality)
        .bind(simplification.is_favorite)
        .bind(simplification.rating)
        .bind(&simplification.feedback_notes)
        .bind(simplification.is_public)
        .bind(&simplification.share_token)
        .bind(simplification.download_count)
        .bind(simplification.last_downloaded_at)
        .bind(simplification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
