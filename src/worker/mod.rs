//! Download worker pool
//!
//! A fixed set of tokio tasks, each draining its own bounded channel fed by
//! the [`TaskBroker`]. A worker runs one download at a time and always
//! leaves the job record in a terminal state.

pub mod broker;
pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ExtractorConfig;
use crate::extractor::VideoExtractor;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;

pub use broker::{QueueError, TaskBroker};
pub use runner::{process_task, quality_label, run_worker, sanitize_filename, spawn_workers};

/// A job handed from the API to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub job_id: String,
    pub url: String,
    pub format: String,
}

/// Everything a worker needs, shared by the whole pool
#[derive(Clone)]
pub struct WorkerContext {
    pub registry: Arc<JobRegistry>,
    pub extractor: Arc<dyn VideoExtractor>,
    pub metrics: Arc<Metrics>,
    pub downloads_dir: PathBuf,
    pub default_format: String,
    pub merge_output_format: String,
}

impl WorkerContext {
    pub fn new(
        registry: Arc<JobRegistry>,
        extractor: Arc<dyn VideoExtractor>,
        metrics: Arc<Metrics>,
        downloads_dir: PathBuf,
        extractor_config: &ExtractorConfig,
    ) -> Self {
        Self {
            registry,
            extractor,
            metrics,
            downloads_dir,
            default_format: extractor_config.default_format.clone(),
            merge_output_format: extractor_config.merge_output_format.clone(),
        }
    }
}
