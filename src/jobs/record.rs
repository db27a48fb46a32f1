use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a download job.
///
/// Ordered `Starting < Downloading < Processing < Complete`; `Error` may be
/// entered from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Downloading,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Starting => 0,
            JobStatus::Downloading => 1,
            JobStatus::Processing => 2,
            JobStatus::Complete => 3,
            JobStatus::Error => 4,
        }
    }

    /// Whether a record in `self` may move to `next`. Staying in the same
    /// state is allowed so repeated progress ticks merge.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Error || next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress record for one download attempt, returned verbatim by the
/// polling endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub url: String,
    pub format: String,
    pub status: JobStatus,
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub(crate) fn new(id: String, url: String, format: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            url,
            format,
            status: JobStatus::Starting,
            percent: 0.0,
            speed: None,
            eta: None,
            filename: None,
            title: None,
            thumbnail: None,
            requested_quality: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the present fields of `update`. The caller has already checked
    /// the status transition.
    pub(crate) fn merge(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(percent) = update.percent {
            self.percent = clamp_percent(percent);
        }
        if self.status == JobStatus::Downloading {
            if update.speed.is_some() {
                self.speed = update.speed;
            }
            if update.eta.is_some() {
                self.eta = update.eta;
            }
        } else {
            self.speed = None;
            self.eta = None;
        }

        let JobUpdate {
            filename,
            title,
            thumbnail,
            requested_quality,
            error,
            ..
        } = update;
        if filename.is_some() {
            self.filename = filename;
        }
        if title.is_some() {
            self.title = title;
        }
        if thumbnail.is_some() {
            self.thumbnail = thumbnail;
        }
        if requested_quality.is_some() {
            self.requested_quality = requested_quality;
        }
        if error.is_some() {
            self.error = error;
        }

        self.updated_at = Utc::now();
    }
}

/// Partial update merged into a [`JobRecord`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub percent: Option<f64>,
    pub speed: Option<f64>,
    pub eta: Option<u64>,
    pub filename: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub requested_quality: Option<String>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Percent is always reported in `[0, 100]`, rounded to two decimals.
pub fn clamp_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}
