use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lunara_api::config::{LogFormat, ServerConfig};
use lunara_api::notifications::NotificationRouter;
use lunara_api::router::build_app_router;
use lunara_api::state::AppState;
use lunara_api::ws;
use lunara_events::EventBus;
use lunara_pipeline::pg::PgStore;
use lunara_pipeline::recovery::recover_jobs;
use lunara_pipeline::{
    GenerationRunner, GenerationWorker, JobQueue, LocalVideoStorage, SubmissionService,
};
use lunara_provider::VeoApi;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();
    init_tracing(config.log_format);
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = lunara_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    lunara_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    lunara_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool));

    let provider = Arc::new(
        VeoApi::new(config.video.clone()).expect("Failed to build video API HTTP client"),
    );
    if config.video.api_key.is_empty() {
        tracing::warn!("VIDEO_API_KEY is not set, generation requests will be refused");
    }

    let storage = Arc::new(LocalVideoStorage::new(
        &config.media.dir,
        config.media.public_path.clone(),
    ));

    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    let event_bus = Arc::new(EventBus::default());
    let notification_router = NotificationRouter::new(Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));
    tracing::info!("Notification router started");

    let runner = Arc::new(GenerationRunner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        provider.clone(),
        storage,
        Arc::clone(&event_bus),
        config.runner.clone(),
    ));

    let (queue, receiver) = JobQueue::channel();

    // Re-enqueue unfinished jobs before new submissions can arrive.
    if let Err(e) = recover_jobs(store.as_ref(), &queue).await {
        tracing::error!(error = %e, "Generation job recovery failed");
    }

    let worker = Arc::new(GenerationWorker::new(runner));
    let worker_cancel = CancellationToken::new();
    let worker_handle = {
        let worker = Arc::clone(&worker);
        let cancel = worker_cancel.clone();
        tokio::spawn(async move { worker.run(receiver, cancel).await })
    };

    let submission = Arc::new(SubmissionService::new(
        store.clone(),
        store.clone(),
        provider,
        queue,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        jobs: store.clone(),
        ledger: store,
        submission,
    };

    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, cleaning up");

    worker_cancel.cancel();
    let _ = worker_handle.await;
    let in_flight = worker.in_flight();
    let drained = worker
        .drain(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if drained {
        tracing::info!(in_flight, "Generation worker drained");
    } else {
        tracing::warn!(
            remaining = worker.in_flight(),
            "Shutdown timeout reached, unfinished jobs resume on next start",
        );
    }

    // The router stops once the last bus handle is gone. Runner tasks still
    // in flight after the timeout keep theirs, so the wait is bounded.
    drop(worker);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), router_handle).await;
    tracing::info!("Notification router stopped");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "lunara_api=debug,lunara_pipeline=debug,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
