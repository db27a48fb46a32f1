use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::record::{JobRecord, JobStatus, JobUpdate};

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {0} already finished")]
    Finalized(String),

    #[error("job {id} cannot move from {from} to {to}")]
    StaleTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

/// In-flight and recently finished download jobs, keyed by job id.
///
/// Shared between request handlers, download workers and the pruning task.
/// The lock is only held for a single map read or write.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh record in `starting` state and return its id
    pub fn create(&self, url: &str, format: &str) -> String {
        let id = Uuid::now_v7().to_string();
        let record = JobRecord::new(id.clone(), url.to_string(), format.to_string());

        self.jobs.write().insert(id.clone(), record);
        debug!(job_id = %id, url, format, "Job registered");
        id
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.read().get(id).cloned()
    }

    /// Merge `update` into the record and return the result.
    ///
    /// Terminal records are never touched again, and status may only move
    /// forward (or divert to `error`).
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, RegistryError> {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if record.status.is_terminal() {
            return Err(RegistryError::Finalized(id.to_string()));
        }

        if let Some(next) = update.status {
            if !record.status.can_advance_to(next) {
                return Err(RegistryError::StaleTransition {
                    id: id.to_string(),
                    from: record.status,
                    to: next,
                });
            }
        }

        record.merge(update);
        Ok(record.clone())
    }

    /// Forget a job, e.g. one that could not be handed to a worker
    pub fn remove(&self, id: &str) -> Option<JobRecord> {
        self.jobs.write().remove(id)
    }

    /// All records, newest first
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Drop finished records whose last update is older than `ttl`
    pub fn prune_finished(&self, ttl: Duration) -> usize {
        let Ok(ttl) = TimeDelta::from_std(ttl) else {
            return 0;
        };
        match Utc::now().checked_sub_signed(ttl) {
            Some(cutoff) => self.prune_finished_before(cutoff),
            None => 0,
        }
    }

    /// Drop finished records last updated before `cutoff`
    pub fn prune_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, record| !(record.status.is_terminal() && record.updated_at < cutoff));
        before - jobs.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let jobs = self.jobs.read();
        let mut stats = RegistryStats {
            total: jobs.len(),
            ..RegistryStats::default()
        };
        for record in jobs.values() {
            match record.status {
                JobStatus::Starting => stats.starting += 1,
                JobStatus::Downloading => stats.downloading += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Error => stats.error += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub starting: usize,
    pub downloading: usize,
    pub processing: usize,
    pub complete: usize,
    pub error: usize,
}
