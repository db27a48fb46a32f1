//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use tubefetch::api::state::AppState;
use tubefetch::config::Config;
use tubefetch::extractor::{
    DownloadOutcome, DownloadRequest, ExtractError, FormatInfo, Thumbnail, VideoExtractor,
    VideoInfo,
};
use tubefetch::jobs::{JobRecord, JobRegistry};
use tubefetch::observability::Metrics;
use tubefetch::progress::{DownloadProgress, ProgressEvent, ProgressSink};
use tubefetch::storage::DownloadStore;
use tubefetch::worker::{DownloadTask, TaskBroker, WorkerContext};

/// Extractor that replays a fixed script instead of running yt-dlp
#[derive(Default)]
pub struct FakeExtractor {
    pub info: VideoInfo,
    pub metadata_error: Option<String>,
    pub events: Vec<ProgressEvent>,
    pub filepath: Option<PathBuf>,
    pub download_error: Option<String>,
    pub downloads: AtomicUsize,
    pub last_request: parking_lot::Mutex<Option<DownloadRequest>>,
}

impl FakeExtractor {
    /// A video that downloads cleanly with two progress ticks
    pub fn new(title: &str) -> Self {
        Self {
            info: VideoInfo {
                id: Some("abc123".into()),
                title: Some(title.to_string()),
                duration: Some(42.0),
                thumbnail: Some("https://img.example/abc123.jpg".into()),
                thumbnails: Some(vec![Thumbnail {
                    url: Some("https://img.example/abc123-small.jpg".into()),
                    ..Thumbnail::default()
                }]),
                formats: Some(vec![FormatInfo {
                    format_id: Some("22".into()),
                    format: Some("22 - 1280x720".into()),
                    width: Some(1280),
                    height: Some(720),
                    ext: Some("mp4".into()),
                }]),
                webpage_url: None,
            },
            events: vec![
                downloading(512, 1024),
                downloading(1024, 1024),
                ProgressEvent::Finished { filename: None },
            ],
            ..Self::default()
        }
    }

    pub fn failing_metadata(message: &str) -> Self {
        Self {
            metadata_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Vec<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_filepath(mut self, path: impl Into<PathBuf>) -> Self {
        self.filepath = Some(path.into());
        self
    }

    pub fn failing_download(mut self, message: &str) -> Self {
        self.download_error = Some(message.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

fn failed(message: &str) -> ExtractError {
    ExtractError::Failed {
        code: Some(1),
        message: message.to_string(),
    }
}

#[async_trait]
impl VideoExtractor for FakeExtractor {
    async fn extract_metadata(&self, _url: &str) -> Result<VideoInfo, ExtractError> {
        match &self.metadata_error {
            Some(message) => Err(failed(message)),
            None => Ok(self.info.clone()),
        }
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, ExtractError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());

        for event in &self.events {
            sink.report(event.clone());
            tokio::task::yield_now().await;
        }

        match &self.download_error {
            Some(message) => Err(failed(message)),
            None => Ok(DownloadOutcome {
                filepath: self.filepath.clone(),
            }),
        }
    }
}

pub fn downloading(downloaded: u64, total: u64) -> ProgressEvent {
    ProgressEvent::Downloading(DownloadProgress {
        downloaded_bytes: Some(downloaded),
        total_bytes: Some(total),
        speed: Some(2048.0),
        eta: Some(1),
        ..DownloadProgress::default()
    })
}

pub fn test_config(downloads_dir: &Path) -> Config {
    let mut config = Config::default();
    config.downloads.dir = downloads_dir.to_path_buf();
    config.worker.num_workers = 2;
    config.worker.queue_capacity = 4;
    config
}

/// Application state whose broker has no workers attached; the receivers
/// are returned so the caller decides whether tasks get processed.
pub async fn test_state(
    config: Config,
    extractor: Option<Arc<dyn VideoExtractor>>,
) -> (AppState, Vec<mpsc::Receiver<DownloadTask>>) {
    let storage = DownloadStore::open(&config.downloads.dir).await.unwrap();
    let (broker, receivers) =
        TaskBroker::new(config.worker.num_workers, config.worker.queue_capacity);

    let state = AppState::new(
        config,
        Arc::new(JobRegistry::new()),
        extractor,
        Arc::new(broker),
        storage,
        Arc::new(Metrics::new()),
    );
    (state, receivers)
}

pub fn worker_context(
    registry: Arc<JobRegistry>,
    extractor: Arc<dyn VideoExtractor>,
    metrics: Arc<Metrics>,
    downloads_dir: &Path,
) -> WorkerContext {
    WorkerContext::new(
        registry,
        extractor,
        metrics,
        downloads_dir.to_path_buf(),
        &Config::default().extractor,
    )
}

/// Poll the registry until the job is terminal
pub async fn wait_for_terminal(registry: &JobRegistry, id: &str) -> JobRecord {
    for _ in 0..500 {
        if let Some(record) = registry.get(id) {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish");
}
