mod checker;
mod config;
mod engine;
mod executor;

use config::LanguageConfigManager;
use engine::{DockerEngine, Sandbox};
use syllabus_common::redis;
use syllabus_common::types::Language;
use tokio::signal;
use tracing::{error, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Syllabus worker booting...");

    let config_manager = LanguageConfigManager::load_default().map_err(|e| {
        error!("Failed to load language configurations: {}", e);
        e
    })?;
    info!("Loaded language configurations for: {:?}", config_manager.list_languages());

    let language_str = std::env::var("WORKER_LANGUAGE").unwrap_or_else(|_| "python".to_string());
    let language = match Language::from_str(&language_str) {
        Some(language) => language,
        None => anyhow::bail!("Invalid WORKER_LANGUAGE '{}', expected python, java or rust", language_str),
    };

    let image = config_manager
        .get_config(&language)
        .map_err(|e| {
            error!("Available languages: {:?}", config_manager.list_languages());
            e
        })?
        .image
        .clone();

    info!("Worker configured for language: {}", language);
    info!("Docker image: {}", image);
    info!("Queue: {}", redis::queue_name(&language));

    let settings = syllabus_common::config::Config::from_env();
    let client = ::redis::Client::open(settings.redis_url.as_str())?;
    let mut redis_conn = ::redis::aio::ConnectionManager::new(client).await?;
    info!("Connected to Redis: {}", settings.redis_url);

    let engine = DockerEngine::new(config_manager)?;

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal");
    };

    tokio::select! {
        _ = worker_loop(&mut redis_conn, &language, &engine) => {},
        _ = shutdown => {},
    }

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip(redis_conn, sandbox), fields(language = %language))]
async fn worker_loop(
    redis_conn: &mut ::redis::aio::ConnectionManager,
    language: &Language,
    sandbox: &dyn Sandbox,
) {
    loop {
        // BLPOP with 5 second timeout for graceful shutdown
        match redis::pop_job(redis_conn, language, 5.0).await {
            Ok(Some(job)) => {
                info!(
                    job_id = %job.id,
                    timeout_ms = job.timeout_ms,
                    test_cases = job.test_cases.len(),
                    source_size = job.source_code.len(),
                    "Received job"
                );

                let start = std::time::Instant::now();
                let reply = executor::execute_job(&job, sandbox).await;
                info!(
                    job_id = %job.id,
                    reply = ?reply,
                    execution_ms = start.elapsed().as_millis(),
                    "Execution completed"
                );

                if let Err(e) = redis::store_reply(redis_conn, &job.id, &reply).await {
                    error!(job_id = %job.id, error = %e, "Failed to publish reply");
                }
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}
