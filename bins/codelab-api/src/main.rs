mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use axum::Router;
use codelab_common::EngineConfig;
use codelab_engine::ExecutionEngine;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub engine: Arc<ExecutionEngine>,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Codelab API booting...");

    metrics::init_metrics();

    let config = EngineConfig::from_env();
    info!(
        service_url = %config.service_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        deadline_ms = config.deadline.as_millis() as u64,
        max_concurrent_batches = config.max_concurrent_batches,
        validation_policy = %config.validation_policy,
        "Engine configuration loaded"
    );

    let engine = ExecutionEngine::with_judge0(config).context("Failed to build execution engine")?;

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
