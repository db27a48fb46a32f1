//! Task runner - processes individual download tasks

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DownloadTask, WorkerContext};
use crate::extractor::{DownloadRequest, ExtractError, VideoInfo};
use crate::jobs::{JobStatus, JobUpdate, RegistryError};
use crate::progress::ProgressAdapter;

/// Spawn one worker per receiver
pub fn spawn_workers(
    ctx: Arc<WorkerContext>,
    receivers: Vec<mpsc::Receiver<DownloadTask>>,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(worker_id, rx)| tokio::spawn(run_worker(worker_id, ctx.clone(), rx)))
        .collect()
}

/// Drain `rx` until every sender is gone, one task at a time
pub async fn run_worker(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    mut rx: mpsc::Receiver<DownloadTask>,
) {
    info!(worker_id, "Worker started");

    while let Some(task) = rx.recv().await {
        debug!(worker_id, job_id = %task.job_id, "Worker picked up task");
        process_task(&ctx, task).await;
    }

    info!(worker_id, "Worker channel closed, exiting");
}

/// Run one download to completion and leave the job in a terminal state.
///
/// Failures never escape: they end up in the record's `error` field.
pub async fn process_task(ctx: &WorkerContext, task: DownloadTask) -> JobStatus {
    let job_id = task.job_id.clone();
    info!(job_id = %job_id, url = %task.url, format = %task.format, "Processing task");

    let update = match run_download(ctx, &task).await {
        Ok(update) => update,
        Err(err) => {
            warn!(job_id = %job_id, error = %err, "Download failed");
            JobUpdate::failed(err.to_string())
        }
    };

    let status = match ctx.registry.update(&job_id, update) {
        Ok(record) => record.status,
        // The progress sink already reported a terminal state
        Err(RegistryError::Finalized(_)) => match ctx.registry.get(&job_id) {
            Some(record) => record.status,
            None => JobStatus::Error,
        },
        Err(err) => {
            error!(job_id = %job_id, error = %err, "Could not record job outcome");
            JobStatus::Error
        }
    };

    match status {
        JobStatus::Complete => {
            ctx.metrics.job_completed();
            info!(job_id = %job_id, "Job complete");
        }
        _ => ctx.metrics.job_failed(),
    }
    status
}

async fn run_download(ctx: &WorkerContext, task: &DownloadTask) -> Result<JobUpdate, ExtractError> {
    let info = ctx.extractor.extract_metadata(&task.url).await?;
    debug!(job_id = %task.job_id, title = ?info.title, "Metadata extracted");

    let format = if task.format.trim().is_empty() {
        ctx.default_format.clone()
    } else {
        task.format.clone()
    };

    let request = DownloadRequest {
        url: task.url.clone(),
        format: format.clone(),
        output_dir: ctx.downloads_dir.clone(),
        merge_output_format: ctx.merge_output_format.clone(),
    };
    let sink = ProgressAdapter::new(ctx.registry.clone(), task.job_id.clone());
    let outcome = ctx.extractor.download(&request, &sink).await?;

    let filename = outcome
        .filepath
        .as_deref()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback_filename(&info, &ctx.merge_output_format));

    Ok(JobUpdate {
        status: Some(JobStatus::Complete),
        percent: Some(100.0),
        filename: Some(filename),
        title: Some(info.title.clone().unwrap_or_else(|| "Unknown".to_string())),
        thumbnail: info.best_thumbnail().map(str::to_owned),
        requested_quality: Some(quality_label(&format).to_string()),
        ..JobUpdate::default()
    })
}

fn fallback_filename(info: &VideoInfo, ext: &str) -> String {
    let title = info.title.as_deref().unwrap_or("video");
    format!("{}.{}", sanitize_filename(title), ext)
}

/// Human label for a format selector
pub fn quality_label(format: &str) -> &'static str {
    if format.contains("720") {
        "720p"
    } else if format.contains("1080") {
        "1080p"
    } else {
        "Best Available"
    }
}

/// Remove characters that are invalid in file names on common platforms
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect()
}
