//! services/worker/src/bin/worker.rs

use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worker_lib::{
    adapters::{DbStore, FormatExtractor, FsBlobStore, OpenAiGatewayAdapter, RateBudget},
    config::Config,
    error::WorkerError,
    pipeline::{DocumentProcessingPipeline, PipelineRunner, SimplificationOrchestrator},
    queue::QueueSubstrate,
    web::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting worker...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(DbStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Port Adapters ---
    let api_key = config
        .openai_api_key
        .as_ref()
        .ok_or_else(|| WorkerError::Internal("OPENAI_API_KEY is required".to_string()))?;
    let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
    let gateway = Arc::new(OpenAiGatewayAdapter::new(
        openai_client,
        Duration::from_secs(config.gateway_timeout_secs),
    ));

    let blobs = Arc::new(FsBlobStore::new(config.storage_root.clone()).await?);
    let extractor = Arc::new(FormatExtractor::new());
    let throttle = Arc::new(RateBudget::new(
        config.requests_per_minute,
        config.tokens_per_minute,
    ));

    // --- 4. Build the Pipelines and Queue Substrate ---
    let documents =
        DocumentProcessingPipeline::new(store.clone(), blobs.clone(), extractor);
    let simplifications = SimplificationOrchestrator::new(
        store.clone(),
        gateway,
        throttle,
        config.clone(),
    );
    let runner = Arc::new(PipelineRunner::new(documents, simplifications, store.clone()));

    let shutdown = CancellationToken::new();
    let queue = Arc::new(QueueSubstrate::start(
        runner,
        config.workers_per_lane,
        shutdown.clone(),
    ));
    info!(workers_per_lane = config.workers_per_lane, "queue substrate started");

    // --- 5. Build the Shared AppState and Router ---
    let app_state = Arc::new(AppState {
        store,
        blobs,
        queue,
        config: config.clone(),
    });
    let app = web::router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped.");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling the queue workers before the server exits.
async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("Shutdown signal received, stopping queue workers...");
    shutdown.cancel();
}
