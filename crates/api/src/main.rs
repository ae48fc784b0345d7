use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipcraftr_api::config::{ServerConfig, StoreBackend};
use clipcraftr_api::notifications::UpdateBridge;
use clipcraftr_api::router::build_app_router;
use clipcraftr_api::state::AppState;
use clipcraftr_api::ws;
use clipcraftr_core::limits::ClipLimits;
use clipcraftr_db::store::{MemoryStore, PgStore, SharedStore};
use clipcraftr_events::{AuditTrail, AuditWriter, EventBus};
use clipcraftr_pipeline::probe::{FfprobeProbe, HttpFetcher, VideoProbe};
use clipcraftr_pipeline::processor::{FfmpegProcessor, MediaProcessor};
use clipcraftr_pipeline::sweeper::Sweeper;
use clipcraftr_pipeline::{
    recovery, Dispatcher, PipelineConfig, PipelineContext, QueueService, SubmissionService,
    WorkerPool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clipcraftr_api=debug,clipcraftr_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        store = ?config.store_backend,
        max_concurrent_jobs = pipeline_config.max_concurrent_jobs,
        "Loaded configuration",
    );

    // --- Store ---
    let store = connect_store(&config).await?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    // --- Event bus and audit trail ---
    let event_bus = Arc::new(EventBus::default());
    let (audit, audit_rx) = AuditTrail::channel();
    let audit_handle = tokio::spawn(AuditWriter::run(store.clone(), audit_rx));

    // --- Pipeline ---
    let ctx = PipelineContext::new(store.clone(), Arc::clone(&event_bus), audit);
    let probe: Arc<dyn VideoProbe> = Arc::new(FfprobeProbe);
    let processor: Arc<dyn MediaProcessor> = Arc::new(FfmpegProcessor::new(
        Arc::clone(&probe),
        config.upload_dir.join("montages"),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        ctx.clone(),
        processor,
        pipeline_config.processing_timeout,
    ));
    let (pool, dispatch) = WorkerPool::new(dispatcher, pipeline_config.max_concurrent_jobs);
    let queue = Arc::new(QueueService::new(ctx.clone(), dispatch.clone()));
    let submissions = Arc::new(SubmissionService::new(
        ctx.clone(),
        Arc::clone(&queue),
        Arc::new(HttpFetcher::new(reqwest::Client::new())),
        probe,
        ClipLimits::from_env(),
        config.upload_dir.clone(),
    ));

    // Orphaned work from a previous run goes back in line before any new
    // request is accepted.
    let report = recovery::recover(&ctx, &dispatch)
        .await
        .context("Startup recovery failed")?;
    tracing::info!(reset = report.reset, redispatched = report.redispatched, "Startup recovery done");

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let pool_handle = tokio::spawn(pool.run(cancel.clone()));
    let sweeper = Sweeper::new(
        ctx,
        dispatch,
        pipeline_config.sweep_interval,
        pipeline_config.max_job_attempts,
    );
    let sweeper_handle = tokio::spawn(sweeper.run(cancel.clone()));

    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), cancel.clone());
    let bridge_handle = tokio::spawn(
        UpdateBridge::new(Arc::clone(&ws_manager)).run(event_bus.subscribe()),
    );

    // --- App state ---
    let state = AppState {
        store,
        queue,
        submissions,
        ws_manager: Arc::clone(&ws_manager),
        event_bus,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let ip = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, pool_handle).await.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Worker pool did not drain in time, in-flight jobs will be recovered on next start",
        );
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    let _ = heartbeat_handle.await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    bridge_handle.abort();
    // The writer stops once every audit handle is gone; give queued records
    // a moment to land.
    let _ = tokio::time::timeout(Duration::from_secs(5), audit_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Build the configured store, running migrations for Postgres.
async fn connect_store(config: &ServerConfig) -> anyhow::Result<SharedStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            let pool = clipcraftr_db::create_pool(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection pool created");

            clipcraftr_db::health_check(&pool)
                .await
                .context("Database health check failed")?;
            tracing::info!("Database health check passed");

            clipcraftr_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
