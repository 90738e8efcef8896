//! services/worker/src/error.rs
//!
//! Defines the primary error type for the entire worker service.

use crate::config::ConfigError;
use cat_tales_core::ports::{BlobError, QueueError, StoreError};

/// The primary error type for the `worker` service.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the persistence port.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Represents an error from the blob storage layer.
    #[error("Blob error: {0}")]
    Blob(#[from] BlobError),

    /// Represents an error from the queue substrate.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Represents an error from the underlying database library.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while running embedded migrations.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding a socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
