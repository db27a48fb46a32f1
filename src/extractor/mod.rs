//! External video extractor
//!
//! Metadata extraction, format negotiation and downloading are delegated to
//! an external tool behind the [`VideoExtractor`] trait. [`YtDlpExtractor`]
//! drives the `yt-dlp` binary.

mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::progress::ProgressSink;

pub use ytdlp::{OutputLine, YtDlpExtractor, parse_output_line};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Failed { code: Option<i32>, message: String },

    #[error("unreadable extractor output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Subset of the extractor's info dictionary that the service reads.
/// Everything is optional because sites omit fields freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub thumbnails: Option<Vec<Thumbnail>>,
    pub formats: Option<Vec<FormatInfo>>,
    pub webpage_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: Option<String>,
    pub id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format_id: Option<String>,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ext: Option<String>,
}

impl VideoInfo {
    /// The explicit `thumbnail`, else the last listed one (usually the
    /// largest).
    pub fn best_thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref().or_else(|| {
            self.thumbnails
                .as_deref()?
                .iter()
                .rev()
                .find_map(|t| t.url.as_deref())
        })
    }
}

/// What to fetch and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub format: String,
    pub output_dir: PathBuf,
    pub merge_output_format: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadOutcome {
    /// Final file path after post-processing, when the extractor reports it
    pub filepath: Option<PathBuf>,
}

#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Look up metadata without downloading anything
    async fn extract_metadata(&self, url: &str) -> Result<VideoInfo>;

    /// Download `request.url`, reporting progress to `sink` along the way
    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome>;
}
