use std::collections::BTreeMap;

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    models::{
        DownloadRequestBody, DownloadStarted, DownloadsDisabled, HealthMetrics, HealthResponse,
        InfoPayload, LimitedDetails, LookupOutcome, SimpleInfoResponse, StoredFileEntry,
        VideoDetails, VideoInfoRequest, VideoInfoResponse, epoch_seconds,
    },
    state::AppState,
    utils::{attachment_disposition, read_json},
    validation::{validate_format, validate_url},
};
use crate::api::error::ApiError;
use crate::video_id::youtube_video_id;
use crate::worker::DownloadTask;

const DEFAULT_REQUEST_FORMAT: &str = "best";
const DOWNLOADS_DISABLED_MESSAGE: &str =
    "Downloads are disabled on this server. Run the tool locally to download videos.";

/// Metadata lookup (POST /api/video-info)
///
/// The lookup runs in its own task and parks its outcome in the lookup
/// cache under a fresh request id; the handler then collects it. A client
/// that hangs up early leaves an entry behind for the pruner.
///
/// Without an extractor the response is built from the URL alone
/// (limited mode), which only works for YouTube links.
pub async fn video_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<VideoInfoResponse>, ApiError> {
    let request: VideoInfoRequest = read_json(&headers, body, state.max_payload_bytes()).await?;
    let url = validate_url(request.url.as_deref())?.to_string();
    state.metrics.lookup();

    let Some(extractor) = state.extractor.clone() else {
        return limited_info(&url).map(Json);
    };

    let request_id = Uuid::new_v4().to_string();
    let lookups = state.lookups.clone();
    let lookup = {
        let request_id = request_id.clone();
        let url = url.clone();
        tokio::spawn(async move {
            let outcome = match extractor.extract_metadata(&url).await {
                Ok(info) => {
                    LookupOutcome::Success(VideoDetails::from_info(&url, youtube_video_id(&url), info))
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "Metadata lookup failed");
                    LookupOutcome::Error {
                        error: err.to_string(),
                    }
                }
            };
            lookups.record(&request_id, outcome);
        })
    };

    if let Err(err) = lookup.await {
        warn!(error = %err, "Metadata lookup task did not finish");
    }

    let response = match state.lookups.take(&request_id) {
        Some(outcome) => VideoInfoResponse {
            success: outcome.is_success(),
            info: Some(InfoPayload::Lookup(outcome)),
            message: None,
            downloadable: state.downloads_enabled(),
            limited_info: false,
        },
        None => VideoInfoResponse {
            success: false,
            info: None,
            message: Some("Failed to retrieve video information".to_string()),
            downloadable: state.downloads_enabled(),
            limited_info: false,
        },
    };

    Ok(Json(response))
}

fn limited_info(url: &str) -> Result<VideoInfoResponse, ApiError> {
    let video_id = youtube_video_id(url)
        .ok_or_else(|| ApiError::InvalidUrl("Could not extract YouTube video ID".to_string()))?;

    Ok(VideoInfoResponse {
        success: true,
        info: Some(InfoPayload::Limited(LimitedDetails::new(url, video_id))),
        message: None,
        downloadable: false,
        limited_info: true,
    })
}

/// Id and canonical links of a YouTube URL, no extractor involved
/// (POST /api/simple-info)
pub async fn simple_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<SimpleInfoResponse>, ApiError> {
    let request: VideoInfoRequest = read_json(&headers, body, state.max_payload_bytes()).await?;
    let url = validate_url(request.url.as_deref())?;

    let video_id = youtube_video_id(url)
        .ok_or_else(|| ApiError::InvalidUrl("Could not extract YouTube video ID".to_string()))?;

    Ok(Json(SimpleInfoResponse::new(video_id)))
}

/// Start a background download (POST /api/download)
///
/// Answers 202 with the job id as soon as a worker queue accepted the task.
/// A submission the queues reject is removed from the registry again.
pub async fn start_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    if !state.downloads_enabled() {
        let body = DownloadsDisabled {
            success: false,
            message: DOWNLOADS_DISABLED_MESSAGE,
        };
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    let request: DownloadRequestBody =
        read_json(&headers, body, state.max_payload_bytes()).await?;
    let url = validate_url(request.url.as_deref())?;
    let format = request
        .format
        .unwrap_or_else(|| DEFAULT_REQUEST_FORMAT.to_string());
    validate_format(&format)?;

    let job_id = state.registry.create(url, &format);
    let task = DownloadTask {
        job_id: job_id.clone(),
        url: url.to_string(),
        format,
    };

    if let Err(err) = state.broker.enqueue(task) {
        state.registry.remove(&job_id);
        return Err(err.into());
    }

    state.metrics.job_submitted();
    info!(job_id = %job_id, url, "Download queued");

    let response = DownloadStarted {
        status: "started",
        download_id: job_id,
    };
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// Progress of one job (GET /api/progress/{download_id})
pub async fn get_progress(
    State(state): State<AppState>,
    Path(download_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .registry
        .get(&download_id)
        .ok_or_else(|| ApiError::NotFound(format!("download {download_id}")))?;

    Ok((StatusCode::OK, Json(record)))
}

/// Every known job, newest first (GET /api/jobs)
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list())
}

/// Finished files in the downloads directory (GET /api/downloads)
pub async fn list_downloads(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredFileEntry>>, ApiError> {
    let files = state.storage.list().await?;
    Ok(Json(files.into_iter().map(StoredFileEntry::from).collect()))
}

/// Stream one finished file as an attachment (GET /downloads/{filename})
pub async fn serve_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let opened = state.storage.open_file(&filename).await?;
    info!(filename = %filename, size = opened.size, "Serving download");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
        .header(header::CONTENT_LENGTH, opened.size)
        .header(header::CONTENT_DISPOSITION, attachment_disposition(&filename))
        .body(Body::from_stream(ReaderStream::new(opened.file)))
        .map_err(|err| ApiError::Internal(err.to_string()))
}

/// Health check (GET /health, GET /api/health-check)
///
/// Components:
/// - api: always healthy if we can answer
/// - extractor: `healthy` or `unavailable` (limited mode, not an outage)
/// - worker_pool: broker channels still open; `disabled` without downloads
/// - storage: downloads directory present
///
/// Returns 503 when any component is `unhealthy`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();

    components.insert("api".to_string(), "healthy".to_string());
    components.insert(
        "extractor".to_string(),
        if state.extractor.is_some() { "healthy" } else { "unavailable" }.to_string(),
    );

    let worker_pool = if !state.downloads_enabled() {
        "disabled"
    } else if state.broker.health_check() {
        "healthy"
    } else {
        "unhealthy"
    };
    components.insert("worker_pool".to_string(), worker_pool.to_string());

    let storage_ok = tokio::fs::metadata(state.storage.root())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    components.insert(
        "storage".to_string(),
        if storage_ok { "healthy" } else { "unhealthy" }.to_string(),
    );

    let all_healthy = components.values().all(|status| status != "unhealthy");
    let (overall_status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: HealthMetrics {
            counters: state.metrics.snapshot(),
            jobs: state.registry.stats(),
            queued: state.broker.queued(),
        },
        timestamp: epoch_seconds(),
    };

    (status_code, Json(response))
}
