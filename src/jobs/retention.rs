//! Periodic removal of finished job records

use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::cache::MetadataCache;
use super::registry::JobRegistry;

/// Prune finished jobs older than `ttl` every `interval`, along with any
/// metadata lookups nobody collected.
///
/// Records stay pollable for at least `ttl` after their last update; jobs
/// that are still running are never removed.
pub fn spawn_pruner<T>(
    registry: Arc<JobRegistry>,
    lookups: Arc<MetadataCache<T>>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()>
where
    T: Send + 'static,
{
    info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "Starting job pruner"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let pruned = registry.prune_finished(ttl);
            let stale_lookups = TimeDelta::from_std(ttl)
                .ok()
                .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
                .map_or(0, |cutoff| lookups.prune_before(cutoff));
            if stale_lookups > 0 {
                debug!(stale_lookups, "Dropped uncollected metadata lookups");
            }
            if pruned > 0 {
                info!(pruned, remaining = registry.len(), "Pruned finished jobs");
            } else {
                debug!(remaining = registry.len(), "No finished jobs to prune");
            }
        }
    })
}
