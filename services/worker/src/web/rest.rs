//! services/worker/src/web/rest.rs
//!
//! Axum handlers for the thin HTTP surface: uploads, enqueue/reprocess/
//! regenerate triggers, status polling, and user feedback actions. All
//! processing happens in the background pipelines; these handlers only
//! mutate records and enqueue jobs.

use crate::adapters::blob::{content_hash, FsBlobStore};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use cat_tales_core::domain::{
    Complexity, Document, DocumentStatusView, ModelTier, Simplification, SimplificationStatusView,
};
use cat_tales_core::params::{select_document_lane, select_simplification_lane};
use cat_tales_core::ports::{Job, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

type HandlerError = (StatusCode, String);

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after an upload is accepted (or deduplicated).
#[derive(Serialize)]
pub struct UploadResponse {
    document_id: Uuid,
    status: cat_tales_core::DocumentStatus,
    /// True when the upload matched an existing document by content hash.
    duplicate: bool,
}

#[derive(Deserialize)]
pub struct CreateSimplificationRequest {
    document_id: Uuid,
    #[serde(default = "default_tier")]
    model_tier: ModelTier,
    #[serde(default = "default_complexity")]
    complexity: Complexity,
}

fn default_tier() -> ModelTier {
    ModelTier::Fast
}

fn default_complexity() -> Complexity {
    Complexity::Intermediate
}

#[derive(Serialize)]
pub struct CreateSimplificationResponse {
    simplification_id: Uuid,
    status: cat_tales_core::SimplificationStatus,
}

#[derive(Deserialize)]
pub struct RateRequest {
    rating: i16,
    notes: Option<String>,
}

#[derive(Serialize)]
pub struct PublishResponse {
    share_token: String,
}

#[derive(Serialize)]
pub struct DownloadResponse {
    title: Option<String>,
    cat_story: Option<String>,
    summary: Option<String>,
    key_concepts: Option<Vec<String>>,
    download_count: i32,
}

//=========================================================================================
// Error mapping helpers
//=========================================================================================

fn store_error(e: StoreError) -> HandlerError {
    match e {
        StoreError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
        StoreError::Unexpected(detail) => {
            error!(error = %detail, "store operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage operation failed".to_string(),
            )
        }
    }
}

fn require_user_id(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

async fn enqueue(state: &AppState, job: Job, lane: cat_tales_core::Lane) -> Result<(), HandlerError> {
    state.queue.enqueue(job, lane).await.map_err(|e| {
        error!(error = %e, "failed to enqueue job");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Background processing is unavailable".to_string(),
        )
    })
}

//=========================================================================================
// Document handlers
//=========================================================================================

/// Upload a document for processing.
///
/// Accepts a multipart/form-data request with a single file part. Duplicate
/// uploads (same user, same content hash) return the existing document
/// instead of storing the bytes twice.
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = require_user_id(&headers)?;

    let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {e}"),
        )
    })?
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let filename = field.file_name().unwrap_or("untitled").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {e}"),
        )
    })?;
    if bytes.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Uploaded file is empty".to_string(),
        ));
    }

    let file_hash = content_hash(&bytes);
    if let Some(existing) = state
        .store
        .find_document_by_hash(user_id, &file_hash)
        .await
        .map_err(store_error)?
    {
        return Ok((
            StatusCode::OK,
            Json(UploadResponse {
                document_id: existing.id,
                status: existing.status,
                duplicate: true,
            }),
        ));
    }

    let stored_path = FsBlobStore::key_for_hash(&file_hash);
    state
        .blobs
        .write(&stored_path, &bytes)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to store uploaded bytes");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store upload".to_string(),
            )
        })?;

    let document = Document::new_upload(
        user_id,
        filename,
        stored_path,
        mime_type,
        bytes.len() as i64,
        file_hash,
    );
    state
        .store
        .create_document(&document)
        .await
        .map_err(store_error)?;

    enqueue(
        &state,
        Job::ProcessDocument {
            document_id: document.id,
        },
        select_document_lane(document.size_bytes),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document_id: document.id,
            status: document.status,
            duplicate: false,
        }),
    ))
}

/// Poll a document's processing state.
pub async fn document_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentStatusView>, HandlerError> {
    let document = state.store.get_document(id).await.map_err(store_error)?;
    Ok(Json(document.status_view()))
}

/// Reset a failed document to `uploaded` and enqueue another attempt.
pub async fn reprocess_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentStatusView>, HandlerError> {
    let mut document = state.store.get_document(id).await.map_err(store_error)?;
    document
        .reprocess()
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    state
        .store
        .save_document(&document)
        .await
        .map_err(store_error)?;

    enqueue(
        &state,
        Job::ProcessDocument { document_id: id },
        select_document_lane(document.size_bytes),
    )
    .await?;
    Ok(Json(document.status_view()))
}

/// Move a terminal-state document into the archive.
pub async fn archive_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentStatusView>, HandlerError> {
    let mut document = state.store.get_document(id).await.map_err(store_error)?;
    document
        .archive()
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    state
        .store
        .save_document(&document)
        .await
        .map_err(store_error)?;
    Ok(Json(document.status_view()))
}

/// Bring an archived document back.
pub async fn restore_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentStatusView>, HandlerError> {
    let mut document = state.store.get_document(id).await.map_err(store_error)?;
    document
        .restore()
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    state
        .store
        .save_document(&document)
        .await
        .map_err(store_error)?;
    Ok(Json(document.status_view()))
}

/// Soft-delete a document; the stored blob is removed, the row is hidden.
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    let mut document = state.store.get_document(id).await.map_err(store_error)?;
    document.soft_delete();
    state
        .store
        .save_document(&document)
        .await
        .map_err(store_error)?;
    if let Err(e) = state.blobs.delete(&document.stored_path).await {
        // The record is already hidden; an orphaned blob is only wasted disk.
        error!(document_id = %id, error = %e, "failed to delete stored blob");
    }
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Simplification handlers
//=========================================================================================

/// Create a simplification request for a completed document and enqueue
/// its generation.
pub async fn create_simplification_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSimplificationRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = require_user_id(&headers)?;

    // Existence check up front; the orchestrator re-checks the document
    // state when the job runs.
    let document = state
        .store
        .get_document(payload.document_id)
        .await
        .map_err(store_error)?;

    let simplification = Simplification::new_request(
        document.id,
        user_id,
        payload.model_tier,
        payload.complexity,
    );
    state
        .store
        .create_simplification(&simplification)
        .await
        .map_err(store_error)?;

    enqueue(
        &state,
        Job::GenerateSimplification {
            simplification_id: simplification.id,
        },
        select_simplification_lane(simplification.model_tier),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSimplificationResponse {
            simplification_id: simplification.id,
            status: simplification.status,
        }),
    ))
}

/// Poll a simplification's generation state.
pub async fn simplification_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimplificationStatusView>, HandlerError> {
    let simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    Ok(Json(simplification.status_view()))
}

/// Reset a failed simplification to `pending` and enqueue a fresh attempt.
pub async fn regenerate_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimplificationStatusView>, HandlerError> {
    let mut simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    simplification
        .regenerate()
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    state
        .store
        .save_simplification(&simplification)
        .await
        .map_err(store_error)?;

    enqueue(
        &state,
        Job::GenerateSimplification {
            simplification_id: id,
        },
        select_simplification_lane(simplification.model_tier),
    )
    .await?;
    Ok(Json(simplification.status_view()))
}

/// Toggle the favorite flag.
pub async fn favorite_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    let mut simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    simplification.toggle_favorite();
    state
        .store
        .save_simplification(&simplification)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store a 1-5 rating with optional free-text notes.
pub async fn rate_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> Result<StatusCode, HandlerError> {
    let mut simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    simplification.rate(payload.rating, payload.notes);
    state
        .store
        .save_simplification(&simplification)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publish a completed story under a fresh unguessable share token.
pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublishResponse>, HandlerError> {
    let mut simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    let token = Uuid::new_v4().simple().to_string();
    simplification
        .publish(token.clone())
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    state
        .store
        .save_simplification(&simplification)
        .await
        .map_err(store_error)?;
    Ok(Json(PublishResponse { share_token: token }))
}

/// Withdraw a published story; its share token stops resolving.
pub async fn unpublish_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    let mut simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    simplification.unpublish();
    state
        .store
        .save_simplification(&simplification)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the generated story for download, bumping the download counter.
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, HandlerError> {
    let mut simplification = state
        .store
        .get_simplification(id)
        .await
        .map_err(store_error)?;
    if simplification.cat_story.is_none() {
        return Err((
            StatusCode::CONFLICT,
            "Story has not been generated yet".to_string(),
        ));
    }
    simplification.record_download();
    state
        .store
        .save_simplification(&simplification)
        .await
        .map_err(store_error)?;
    Ok(Json(DownloadResponse {
        title: simplification.generated_title,
        cat_story: simplification.cat_story,
        summary: simplification.summary,
        key_concepts: simplification.key_concepts,
        download_count: simplification.download_count,
    }))
}
