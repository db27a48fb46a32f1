use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::DownloadTask;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("all worker queues are full")]
    Full,

    #[error("worker pool is shut down")]
    Closed,
}

/// TaskBroker distributes download tasks from the API to the worker pool
///
/// 1. API calls `broker.enqueue(task)`
/// 2. Broker picks the next worker round-robin
/// 3. Task goes into that worker's bounded channel with `try_send`
/// 4. If that channel is full, the remaining workers are tried in order
///
/// Nothing waits: when every channel is full the caller gets
/// [`QueueError::Full`] and answers 503.
pub struct TaskBroker {
    worker_channels: Vec<mpsc::Sender<DownloadTask>>,
    next_worker: AtomicUsize,
}

impl TaskBroker {
    /// Create the broker and one receiver per worker
    pub fn new(
        num_workers: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<DownloadTask>>) {
        info!(
            num_workers,
            channel_size, "Creating TaskBroker with worker channels"
        );

        let (worker_channels, worker_receivers) = (0..num_workers)
            .map(|_| mpsc::channel(channel_size.max(1)))
            .unzip();

        let broker = Self {
            worker_channels,
            next_worker: AtomicUsize::new(0),
        };

        (broker, worker_receivers)
    }

    /// Hand `task` to a worker, returning the index of the worker that
    /// accepted it
    pub fn enqueue(&self, task: DownloadTask) -> Result<usize, QueueError> {
        let workers = self.worker_channels.len();
        if workers == 0 {
            return Err(QueueError::Closed);
        }

        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let mut task = task;
        let mut saw_full = false;

        for offset in 0..workers {
            let worker_idx = (start + offset) % workers;
            match self.worker_channels[worker_idx].try_send(task) {
                Ok(()) => {
                    debug!(worker_idx, "Task sent to worker");
                    return Ok(worker_idx);
                }
                Err(mpsc::error::TrySendError::Full(returned)) => {
                    saw_full = true;
                    task = returned;
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    warn!(worker_idx, job_id = %returned.job_id, "Worker channel closed");
                    task = returned;
                }
            }
        }

        if saw_full {
            warn!(job_id = %task.job_id, "All worker queues full, rejecting task");
            Err(QueueError::Full)
        } else {
            Err(QueueError::Closed)
        }
    }

    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// Tasks waiting in worker channels, not counting those being processed
    pub fn queued(&self) -> usize {
        self.worker_channels
            .iter()
            .map(|ch| ch.max_capacity() - ch.capacity())
            .sum()
    }

    /// True when every worker is still receiving
    pub fn health_check(&self) -> bool {
        !self.worker_channels.is_empty() && self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
