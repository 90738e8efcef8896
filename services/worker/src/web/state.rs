//! services/worker/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use cat_tales_core::ports::{BlobStore, JobQueue, Store};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub config: Arc<Config>,
}
