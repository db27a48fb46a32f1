mod common;

use std::sync::Arc;

use common::{FakeExtractor, downloading, wait_for_terminal, worker_context};
use tubefetch::jobs::{JobRegistry, JobStatus};
use tubefetch::observability::Metrics;
use tubefetch::progress::ProgressEvent;
use tubefetch::worker::{DownloadTask, TaskBroker, process_task, spawn_workers};

fn task(registry: &JobRegistry, format: &str) -> DownloadTask {
    let url = "https://youtu.be/abc123";
    DownloadTask {
        job_id: registry.create(url, format),
        url: url.to_string(),
        format: format.to_string(),
    }
}

#[tokio::test]
async fn test_successful_download_completes_job() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let metrics = Arc::new(Metrics::new());
    let extractor = Arc::new(
        FakeExtractor::new("My: Clip?").with_filepath(dir.path().join("My Clip.mp4")),
    );
    let ctx = worker_context(registry.clone(), extractor.clone(), metrics.clone(), dir.path());

    let task = task(&registry, "bestvideo[height<=1080]+bestaudio");
    let id = task.job_id.clone();
    let status = process_task(&ctx, task).await;

    assert_eq!(status, JobStatus::Complete);
    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, JobStatus::Complete);
    assert_eq!(record.percent, 100.0);
    assert_eq!(record.title.as_deref(), Some("My: Clip?"));
    assert_eq!(record.filename.as_deref(), Some("My Clip.mp4"));
    assert_eq!(
        record.thumbnail.as_deref(),
        Some("https://img.example/abc123.jpg")
    );
    assert_eq!(record.requested_quality.as_deref(), Some("1080p"));
    assert_eq!(record.error, None);
    assert_eq!(record.speed, None);

    let request = extractor.last_request.lock().clone().unwrap();
    assert_eq!(request.output_dir, dir.path());
    assert_eq!(request.merge_output_format, "mp4");
    assert_eq!(metrics.snapshot().jobs_completed, 1);
}

#[tokio::test]
async fn test_filename_falls_back_to_sanitized_title() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let ctx = worker_context(
        registry.clone(),
        Arc::new(FakeExtractor::new("What? A: Clip")),
        Arc::new(Metrics::new()),
        dir.path(),
    );

    let task = task(&registry, "best");
    let id = task.job_id.clone();
    process_task(&ctx, task).await;

    let record = registry.get(&id).unwrap();
    assert_eq!(record.filename.as_deref(), Some("What A Clip.mp4"));
    assert_eq!(record.requested_quality.as_deref(), Some("Best Available"));
}

#[tokio::test]
async fn test_empty_format_uses_configured_default() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let extractor = Arc::new(FakeExtractor::new("Clip"));
    let ctx = worker_context(registry.clone(), extractor.clone(), Arc::new(Metrics::new()), dir.path());

    let task = task(&registry, "");
    let id = task.job_id.clone();
    process_task(&ctx, task).await;

    let request = extractor.last_request.lock().clone().unwrap();
    assert_eq!(
        request.format,
        "bestvideo[height<=720]+bestaudio/best[height<=720]"
    );
    assert_eq!(
        registry.get(&id).unwrap().requested_quality.as_deref(),
        Some("720p")
    );
}

#[tokio::test]
async fn test_metadata_failure_is_terminal_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let metrics = Arc::new(Metrics::new());
    let extractor = Arc::new(FakeExtractor::failing_metadata(
        "ERROR: [youtube] abc123: Video unavailable",
    ));
    let ctx = worker_context(registry.clone(), extractor.clone(), metrics.clone(), dir.path());

    let task = task(&registry, "best");
    let id = task.job_id.clone();
    let status = process_task(&ctx, task).await;

    assert_eq!(status, JobStatus::Error);
    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(
        record.error.as_deref(),
        Some("ERROR: [youtube] abc123: Video unavailable")
    );
    assert_eq!(extractor.download_count(), 0);
    assert_eq!(metrics.snapshot().jobs_failed, 1);
}

#[tokio::test]
async fn test_download_failure_after_progress() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let extractor = Arc::new(
        FakeExtractor::new("Clip")
            .with_events(vec![downloading(100, 1000)])
            .failing_download("HTTP Error 403: Forbidden"),
    );
    let ctx = worker_context(registry.clone(), extractor, Arc::new(Metrics::new()), dir.path());

    let task = task(&registry, "best");
    let id = task.job_id.clone();
    process_task(&ctx, task).await;

    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(record.percent, 10.0);
    assert_eq!(record.error.as_deref(), Some("HTTP Error 403: Forbidden"));
}

#[tokio::test]
async fn test_error_event_wins_over_later_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let metrics = Arc::new(Metrics::new());
    let extractor = Arc::new(FakeExtractor::new("Clip").with_events(vec![
        downloading(1, 2),
        ProgressEvent::Error {
            message: Some("fragment 3 not found".into()),
        },
    ]));
    let ctx = worker_context(registry.clone(), extractor, metrics.clone(), dir.path());

    let task = task(&registry, "best");
    let id = task.job_id.clone();
    let status = process_task(&ctx, task).await;

    // The extractor returned success, but the record was already final
    assert_eq!(status, JobStatus::Error);
    let record = registry.get(&id).unwrap();
    assert_eq!(record.error.as_deref(), Some("fragment 3 not found"));
    assert_eq!(record.title, None);
    assert_eq!(metrics.snapshot().jobs_failed, 1);
    assert_eq!(metrics.snapshot().jobs_completed, 0);
}

#[tokio::test]
async fn test_late_download_event_does_not_regress() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let extractor = Arc::new(FakeExtractor::new("Clip").with_events(vec![
        downloading(10, 100),
        ProgressEvent::Finished { filename: None },
        downloading(20, 100),
    ]));
    let ctx = worker_context(registry.clone(), extractor, Arc::new(Metrics::new()), dir.path());

    let task = task(&registry, "best");
    let id = task.job_id.clone();
    process_task(&ctx, task).await;

    let record = registry.get(&id).unwrap();
    assert_eq!(record.status, JobStatus::Complete);
    assert_eq!(record.percent, 100.0);
}

#[tokio::test]
async fn test_pool_processes_queued_tasks_and_exits() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::new());
    let extractor = Arc::new(FakeExtractor::new("Clip"));
    let ctx = Arc::new(worker_context(
        registry.clone(),
        extractor.clone(),
        Arc::new(Metrics::new()),
        dir.path(),
    ));

    let (broker, receivers) = TaskBroker::new(2, 8);
    let handles = spawn_workers(ctx, receivers);

    let ids: Vec<String> = (0..5)
        .map(|_| {
            let task = task(&registry, "best");
            let id = task.job_id.clone();
            broker.enqueue(task).unwrap();
            id
        })
        .collect();

    for id in &ids {
        let record = wait_for_terminal(&registry, id).await;
        assert_eq!(record.status, JobStatus::Complete);
    }
    assert_eq!(extractor.download_count(), 5);

    // Dropping the broker closes every channel and the workers return
    drop(broker);
    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }
}
