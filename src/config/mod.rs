//! Configuration management for tubefetch
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Environment Variables
//!
//! Any key can be overridden with `TUBEFETCH__<section>__<key>`:
//! - `TUBEFETCH__SERVER__BIND_ADDR=127.0.0.1:9000`
//! - `TUBEFETCH__DOWNLOADS__ENABLED=false`
//! - `TUBEFETCH__WORKER__NUM_WORKERS=8`
//!
//! # Configuration File
//!
//! Loaded from `config/tubefetch.toml` unless `TUBEFETCH_CONFIG` or the
//! `--config` flag points elsewhere.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, DownloadsConfig, ExtractorConfig, RetentionConfig, ServerConfig, WorkerConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// `path` overrides the `TUBEFETCH_CONFIG` / default file location.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, skipping `.env`
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

impl RetentionConfig {
    /// How long finished jobs stay pollable, `None` when pruning is off
    pub fn job_ttl(&self) -> Option<Duration> {
        (self.job_ttl_secs > 0).then(|| Duration::from_secs(self.job_ttl_secs))
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}
