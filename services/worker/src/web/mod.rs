//! services/worker/src/web/mod.rs

pub mod rest;
pub mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Builds the full HTTP router over the shared application state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/documents", post(rest::upload_document_handler))
        .route("/documents/{id}/status", get(rest::document_status_handler))
        .route(
            "/documents/{id}/reprocess",
            post(rest::reprocess_document_handler),
        )
        .route(
            "/documents/{id}/archive",
            post(rest::archive_document_handler),
        )
        .route(
            "/documents/{id}/restore",
            post(rest::restore_document_handler),
        )
        .route("/documents/{id}", delete(rest::delete_document_handler))
        .route(
            "/simplifications",
            post(rest::create_simplification_handler),
        )
        .route(
            "/simplifications/{id}/status",
            get(rest::simplification_status_handler),
        )
        .route(
            "/simplifications/{id}/regenerate",
            post(rest::regenerate_handler),
        )
        .route(
            "/simplifications/{id}/favorite",
            post(rest::favorite_handler),
        )
        .route("/simplifications/{id}/rate", post(rest::rate_handler))
        .route("/simplifications/{id}/publish", post(rest::publish_handler))
        .route(
            "/simplifications/{id}/unpublish",
            post(rest::unpublish_handler),
        )
        .route(
            "/simplifications/{id}/download",
            get(rest::download_handler),
        )
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
