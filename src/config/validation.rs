use super::models::Config;
use crate::humanize::ByteSize;
use thiserror::Error;

const PAYLOAD_LIMIT: ByteSize = ByteSize::mib(5);

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker.num_workers must be at least 1")]
    NoWorkers,

    #[error("worker.queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("extractor.binary must not be empty")]
    MissingExtractorBinary,

    #[error("extractor.merge_output_format '{0}' is not a plain file extension")]
    InvalidMergeFormat(String),

    #[error("server.max_payload_bytes ({actual}) exceeds limit of {limit}")]
    PayloadLimitTooLarge { actual: ByteSize, limit: ByteSize },

    #[error("retention.prune_interval_secs must be positive when job_ttl_secs is set")]
    InvalidPruneInterval,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_extractor(config)?;
    validate_server(config)?;
    validate_retention(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.num_workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.worker.queue_capacity == 0 {
        return Err(ValidationError::ZeroQueueCapacity);
    }
    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    if config.extractor.binary.trim().is_empty() {
        return Err(ValidationError::MissingExtractorBinary);
    }

    let ext = &config.extractor.merge_output_format;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidMergeFormat(ext.clone()));
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_payload_bytes > PAYLOAD_LIMIT {
        return Err(ValidationError::PayloadLimitTooLarge {
            actual: config.server.max_payload_bytes,
            limit: PAYLOAD_LIMIT,
        });
    }
    Ok(())
}

fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    if config.retention.job_ttl_secs > 0 && config.retention.prune_interval_secs == 0 {
        return Err(ValidationError::InvalidPruneInterval);
    }
    Ok(())
}
