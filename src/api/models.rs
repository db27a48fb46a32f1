//! Request and response bodies of the HTTP API.
//!
//! - `POST /api/video-info` takes a [`VideoInfoRequest`] and answers with a
//!   [`VideoInfoResponse`]
//! - `POST /api/download` takes a [`DownloadRequestBody`] and answers with
//!   [`DownloadStarted`] (or [`DownloadsDisabled`])
//! - `GET /api/progress/{id}` returns the job record itself
//!
//! A lookup that reaches the extractor and fails is not an HTTP error: the
//! response is 200 with `success: false` and the message under `info.error`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::extractor::VideoInfo;
use crate::jobs::RegistryStats;
use crate::observability::MetricsSnapshot;
use crate::storage::StoredFile;
use crate::video_id::thumbnail_url;

#[derive(Debug, Deserialize)]
pub struct VideoInfoRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequestBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailEntry {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEntry {
    pub format_id: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ext: Option<String>,
}

/// Metadata returned by a successful lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoDetails {
    pub title: String,
    pub duration: Option<f64>,
    pub thumbnails: Vec<ThumbnailEntry>,
    pub formats: Vec<FormatEntry>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl VideoDetails {
    pub fn from_info(url: &str, video_id: Option<String>, info: VideoInfo) -> Self {
        let mut thumbnails = Vec::new();
        if let Some(url) = info.thumbnail {
            thumbnails.push(ThumbnailEntry {
                url,
                kind: "default".to_string(),
            });
        }
        for (i, thumb) in info.thumbnails.unwrap_or_default().into_iter().enumerate() {
            if let Some(url) = thumb.url {
                thumbnails.push(ThumbnailEntry {
                    url,
                    kind: format!("thumbnail_{i}"),
                });
            }
        }

        let formats = info
            .formats
            .unwrap_or_default()
            .into_iter()
            .filter_map(|f| {
                Some(FormatEntry {
                    format_id: f.format_id.filter(|id| !id.is_empty())?,
                    format: f.format,
                    width: f.width,
                    height: f.height,
                    ext: f.ext,
                })
            })
            .collect();

        Self {
            title: info.title.unwrap_or_else(|| "Unknown".to_string()),
            duration: info.duration,
            thumbnails,
            formats,
            url: url.to_string(),
            video_id: video_id.or(info.id),
            timestamp: epoch_seconds(),
        }
    }
}

/// Outcome of one metadata lookup, kept in the lookup cache until the
/// request that started it collects it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    Success(VideoDetails),
    Error { error: String },
}

impl LookupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LookupOutcome::Success(_))
    }
}

/// What can be said about a URL without an extractor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitedDetails {
    pub status: &'static str,
    pub title: &'static str,
    pub video_id: String,
    pub url: String,
    pub thumbnail: String,
    pub message: &'static str,
}

impl LimitedDetails {
    pub fn new(url: &str, video_id: String) -> Self {
        Self {
            status: "success",
            title: "YouTube Video",
            thumbnail: thumbnail_url(&video_id),
            video_id,
            url: url.to_string(),
            message: "Limited information available without a video extractor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InfoPayload {
    Lookup(LookupOutcome),
    Limited(LimitedDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfoResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub downloadable: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub limited_info: bool,
}

/// Identifiers and canonical links derived from a YouTube URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleInfoResponse {
    pub status: &'static str,
    pub video_id: String,
    pub youtube_url: String,
    pub embed_url: String,
    pub thumbnail: String,
}

impl SimpleInfoResponse {
    pub fn new(video_id: String) -> Self {
        Self {
            status: "success",
            youtube_url: format!("https://www.youtube.com/watch?v={video_id}"),
            embed_url: format!("https://www.youtube.com/embed/{video_id}"),
            thumbnail: thumbnail_url(&video_id),
            video_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadStarted {
    pub status: &'static str,
    pub download_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadsDisabled {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFileEntry {
    pub name: String,
    pub size: u64,
    pub size_human: String,
    /// Seconds since the Unix epoch
    pub created: f64,
}

impl From<StoredFile> for StoredFileEntry {
    fn from(file: StoredFile) -> Self {
        Self {
            name: file.name,
            size: file.size.as_u64(),
            size_human: file.size.to_human_readable(),
            created: file.created.timestamp_millis() as f64 / 1000.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthMetrics {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub jobs: RegistryStats,
    pub queued: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub version: String,
    pub metrics: HealthMetrics,
    pub timestamp: f64,
}

pub(crate) fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
