use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::{
    services::{
        get_progress, health, list_downloads, list_jobs, serve_download, simple_info,
        start_download, video_info,
    },
    state::AppState,
};
use crate::config::Config;
use crate::extractor::{VideoExtractor, YtDlpExtractor};
use crate::jobs::{JobRegistry, spawn_pruner};
use crate::observability::Metrics;
use crate::storage::DownloadStore;
use crate::worker::{TaskBroker, WorkerContext, spawn_workers};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes with CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/video-info", post(video_info))
        .route("/api/simple-info", post(simple_info))
        .route("/api/download", post(start_download))
        .route("/api/progress/{download_id}", get(get_progress))
        .route("/api/jobs", get(list_jobs))
        .route("/api/downloads", get(list_downloads))
        .route("/downloads/{filename}", get(serve_download))
        .route("/api/health-check", get(health))
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Wire up the services described by `config` and serve until a shutdown
/// signal arrives
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    let storage = DownloadStore::open(&config.downloads.dir)
        .await
        .map_err(|e| format!("Failed to prepare downloads directory: {e}"))?;

    let ytdlp = YtDlpExtractor::new(config.extractor.binary.clone());
    let probe = ytdlp.probe().await;
    let extractor: Option<Arc<dyn VideoExtractor>> = match probe {
        Ok(version) => {
            info!(binary = ytdlp.binary(), %version, "Video extractor available");
            Some(Arc::new(ytdlp))
        }
        Err(err) => {
            warn!(
                binary = ytdlp.binary(),
                error = %err,
                "Video extractor unavailable, serving limited information only"
            );
            None
        }
    };

    let registry = Arc::new(JobRegistry::new());
    let metrics = Arc::new(Metrics::new());

    let (broker, worker_receivers) =
        TaskBroker::new(config.worker.num_workers, config.worker.queue_capacity);
    let broker = Arc::new(broker);

    match (&extractor, config.downloads.enabled) {
        (Some(extractor), true) => {
            let ctx = Arc::new(WorkerContext::new(
                registry.clone(),
                extractor.clone(),
                metrics.clone(),
                storage.root().to_path_buf(),
                &config.extractor,
            ));
            let workers = spawn_workers(ctx, worker_receivers);
            info!(workers = workers.len(), "Download workers started");
        }
        _ => info!("Downloads disabled, no workers started"),
    }

    let state = AppState::new(
        config.clone(),
        registry.clone(),
        extractor,
        broker,
        storage,
        metrics,
    );

    if let Some(ttl) = config.retention.job_ttl() {
        spawn_pruner(
            registry,
            state.lookups.clone(),
            ttl,
            config.retention.prune_interval(),
        );
    } else {
        info!("Job pruning disabled");
    }

    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "tubefetch listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
