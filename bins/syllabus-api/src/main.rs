mod catalog;
mod evaluator;
mod handlers;
mod metrics;
mod pipeline;
mod recorder;
mod relations;
mod routes;
mod runner;

use anyhow::Context;
use axum::Router;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use syllabus_common::config::Config;
use syllabus_common::redis::RedisStore;
use syllabus_common::store::Documents;
use tokio::net::TcpListener;
use tracing::info;

use evaluator::Evaluator;
use runner::QueueRunner;

pub struct AppState {
    pub docs: Documents,
    pub evaluator: Evaluator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Syllabus API booting...");

    let config = Config::from_env();
    metrics::register();

    // Connect to Redis
    let client = redis::Client::open(config.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    info!("Connected to Redis: {}", config.redis_url);

    let grace = Duration::from_millis(config.runner_timeout_ms);
    let runner = QueueRunner::new(
        redis_conn.clone(),
        Duration::from_millis(config.runner_poll_ms),
        grace,
    );

    let state = Arc::new(AppState {
        docs: Documents::new(Arc::new(RedisStore::new(redis_conn))),
        evaluator: Evaluator::new(Arc::new(runner), grace),
    });

    // Build router
    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);
    info!(runner_timeout_ms = config.runner_timeout_ms, "Ready to grade submissions");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
