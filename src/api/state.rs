use std::sync::Arc;

use super::models::LookupOutcome;
use crate::config::Config;
use crate::extractor::VideoExtractor;
use crate::jobs::{JobRegistry, MetadataCache};
use crate::observability::Metrics;
use crate::storage::DownloadStore;
use crate::worker::TaskBroker;

/// Services shared by every handler, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub lookups: Arc<MetadataCache<LookupOutcome>>,
    /// `None` when the extractor binary could not be run; the API then
    /// answers in limited mode and refuses downloads
    pub extractor: Option<Arc<dyn VideoExtractor>>,
    pub broker: Arc<TaskBroker>,
    pub storage: Arc<DownloadStore>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<JobRegistry>,
        extractor: Option<Arc<dyn VideoExtractor>>,
        broker: Arc<TaskBroker>,
        storage: DownloadStore,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            lookups: Arc::new(MetadataCache::new()),
            extractor,
            broker,
            storage: Arc::new(storage),
            metrics,
        }
    }

    /// Downloads need both the config switch and a working extractor
    pub fn downloads_enabled(&self) -> bool {
        self.config.downloads.enabled && self.extractor.is_some()
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.config.server.max_payload_bytes.as_usize()
    }
}
