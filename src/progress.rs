//! Translation of extractor progress events into job record updates

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::jobs::{JobRegistry, JobStatus, JobUpdate, RegistryError, clamp_percent};

/// Transfer counters reported while a file is being fetched. Every field is
/// optional; extractors report whatever they know.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgress {
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    pub speed: Option<f64>,
    pub eta: Option<u64>,
    pub filename: Option<String>,
}

impl DownloadProgress {
    /// `downloaded / total` as a percentage, 0 when the total is unknown.
    /// An exact total wins over an estimate.
    pub fn percent(&self) -> f64 {
        let total = self
            .total_bytes
            .filter(|&t| t > 0)
            .or(self.total_bytes_estimate)
            .unwrap_or(0);
        if total == 0 {
            return 0.0;
        }
        let downloaded = self.downloaded_bytes.unwrap_or(0);
        clamp_percent(downloaded as f64 / total as f64 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading(DownloadProgress),
    /// Transfer is done and post-processing (merge, remux) may follow
    Finished { filename: Option<String> },
    Error { message: Option<String> },
}

impl ProgressEvent {
    /// Registry update corresponding to this event
    pub fn to_update(&self) -> JobUpdate {
        match self {
            ProgressEvent::Downloading(progress) => JobUpdate {
                status: Some(JobStatus::Downloading),
                percent: Some(progress.percent()),
                speed: Some(progress.speed.unwrap_or(0.0)),
                eta: Some(progress.eta.unwrap_or(0)),
                filename: progress.filename.clone(),
                ..JobUpdate::default()
            },
            ProgressEvent::Finished { filename } => JobUpdate {
                status: Some(JobStatus::Processing),
                percent: Some(100.0),
                filename: filename.clone(),
                ..JobUpdate::default()
            },
            ProgressEvent::Error { message } => {
                JobUpdate::failed(message.as_deref().unwrap_or("Unknown error"))
            }
        }
    }
}

/// Receiver of progress events for a single download
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Writes progress events for one job into the registry.
///
/// Events for unknown or already finished jobs, and late events that would
/// move a job backwards, are dropped.
#[derive(Clone)]
pub struct ProgressAdapter {
    registry: Arc<JobRegistry>,
    job_id: String,
}

impl ProgressAdapter {
    pub fn new(registry: Arc<JobRegistry>, job_id: impl Into<String>) -> Self {
        Self {
            registry,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl ProgressSink for ProgressAdapter {
    fn report(&self, event: ProgressEvent) {
        match self.registry.update(&self.job_id, event.to_update()) {
            Ok(record) => trace!(
                job_id = %self.job_id,
                status = %record.status,
                percent = record.percent,
                "Progress recorded"
            ),
            Err(RegistryError::StaleTransition { from, to, .. }) => {
                trace!(job_id = %self.job_id, %from, %to, "Ignoring late progress event")
            }
            Err(err) => debug!(job_id = %self.job_id, error = %err, "Dropping progress event"),
        }
    }
}

/// Progress dictionary as printed by the extractor, one JSON object per line.
///
/// Numbers arrive as integers or floats depending on the field and the
/// extractor version, so all of them are read as `f64`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProgress {
    pub status: Option<String>,
    pub downloaded_bytes: Option<f64>,
    pub total_bytes: Option<f64>,
    pub total_bytes_estimate: Option<f64>,
    pub speed: Option<f64>,
    pub eta: Option<f64>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl RawProgress {
    /// `None` for statuses that carry no progress information
    pub fn into_event(self) -> Option<ProgressEvent> {
        match self.status.as_deref()? {
            "downloading" => Some(ProgressEvent::Downloading(DownloadProgress {
                downloaded_bytes: self.downloaded_bytes.map(to_count),
                total_bytes: self.total_bytes.map(to_count),
                total_bytes_estimate: self.total_bytes_estimate.map(to_count),
                speed: self.speed.filter(|s| s.is_finite() && *s >= 0.0),
                eta: self.eta.map(to_count),
                filename: self.filename,
            })),
            "finished" => Some(ProgressEvent::Finished {
                filename: self.filename,
            }),
            "error" => Some(ProgressEvent::Error {
                message: self.error,
            }),
            _ => None,
        }
    }
}

fn to_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> Option<ProgressEvent> {
        serde_json::from_str::<RawProgress>(json).unwrap().into_event()
    }

    #[test]
    fn test_percent_prefers_exact_total() {
        let progress = DownloadProgress {
            downloaded_bytes: Some(50),
            total_bytes: Some(200),
            total_bytes_estimate: Some(100),
            ..DownloadProgress::default()
        };
        assert_eq!(progress.percent(), 25.0);
    }

    #[test]
    fn test_percent_falls_back_to_estimate() {
        let progress = DownloadProgress {
            downloaded_bytes: Some(1),
            total_bytes: Some(0),
            total_bytes_estimate: Some(3),
            ..DownloadProgress::default()
        };
        assert_eq!(progress.percent(), 33.33);
    }

    #[test]
    fn test_percent_unknown_total() {
        let progress = DownloadProgress {
            downloaded_bytes: Some(4096),
            ..DownloadProgress::default()
        };
        assert_eq!(progress.percent(), 0.0);
    }

    #[test]
    fn test_percent_never_exceeds_hundred() {
        let progress = DownloadProgress {
            downloaded_bytes: Some(120),
            total_bytes_estimate: Some(100),
            ..DownloadProgress::default()
        };
        assert_eq!(progress.percent(), 100.0);
    }

    #[test]
    fn test_downloading_update_defaults_missing_fields() {
        let update = ProgressEvent::Downloading(DownloadProgress::default()).to_update();
        assert_eq!(update.status, Some(JobStatus::Downloading));
        assert_eq!(update.percent, Some(0.0));
        assert_eq!(update.speed, Some(0.0));
        assert_eq!(update.eta, Some(0));
        assert_eq!(update.filename, None);
    }

    #[test]
    fn test_finished_and_error_updates() {
        let finished = ProgressEvent::Finished {
            filename: Some("a.f137.mp4".into()),
        }
        .to_update();
        assert_eq!(finished.status, Some(JobStatus::Processing));
        assert_eq!(finished.percent, Some(100.0));

        let error = ProgressEvent::Error { message: None }.to_update();
        assert_eq!(error.status, Some(JobStatus::Error));
        assert_eq!(error.error.as_deref(), Some("Unknown error"));
    }

    #[test]
    fn test_raw_progress_mapping() {
        let event = raw(
            r#"{"status":"downloading","downloaded_bytes":1024,"total_bytes":null,
                "total_bytes_estimate":4096.0,"speed":512.5,"eta":6,"filename":"v.mp4"}"#,
        )
        .unwrap();
        let ProgressEvent::Downloading(progress) = event else {
            panic!("expected downloading event");
        };
        assert_eq!(progress.downloaded_bytes, Some(1024));
        assert_eq!(progress.total_bytes, None);
        assert_eq!(progress.percent(), 25.0);
        assert_eq!(progress.speed, Some(512.5));
        assert_eq!(progress.eta, Some(6));

        assert_eq!(
            raw(r#"{"status":"finished","filename":"v.mp4"}"#),
            Some(ProgressEvent::Finished {
                filename: Some("v.mp4".into())
            })
        );
        assert_eq!(raw(r#"{"status":"started"}"#), None);
        assert_eq!(raw(r#"{}"#), None);
    }

    #[test]
    fn test_adapter_writes_registry() {
        let registry = Arc::new(JobRegistry::new());
        let id = registry.create("https://a", "best");
        let adapter = ProgressAdapter::new(registry.clone(), id.clone());

        adapter.report(ProgressEvent::Downloading(DownloadProgress {
            downloaded_bytes: Some(10),
            total_bytes: Some(40),
            speed: Some(99.0),
            ..DownloadProgress::default()
        }));
        let record = registry.get(&id).unwrap();
        assert_eq!(record.status, JobStatus::Downloading);
        assert_eq!(record.percent, 25.0);
        assert_eq!(record.speed, Some(99.0));

        adapter.report(ProgressEvent::Finished { filename: None });
        adapter.report(ProgressEvent::Downloading(DownloadProgress::default()));
        let record = registry.get(&id).unwrap();
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(record.percent, 100.0);
    }

    #[test]
    fn test_adapter_ignores_unknown_job() {
        let registry = Arc::new(JobRegistry::new());
        let adapter = ProgressAdapter::new(registry.clone(), "ghost");
        adapter.report(ProgressEvent::Finished { filename: None });
        assert!(registry.is_empty());
    }
}
