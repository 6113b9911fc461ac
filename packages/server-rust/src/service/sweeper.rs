//! Background removal of attribute tables that outlived their request.
//!
//! A table left behind means a request bypassed the lifecycle layer. The
//! sweeper bounds the damage by purging tables older than a configured age.

use std::sync::Arc;

use async_trait::async_trait;
use reqscope_core::RequestStore;
use tracing::{debug, info, warn};

use super::config::{ConfigError, SweeperConfig};
use super::worker::{BackgroundRunnable, BackgroundWorker};

/// Name of the counter incremented with every purged table.
pub const PURGED_COUNTER: &str = "reqscope_sweeper_purged_total";

// ---------------------------------------------------------------------------
// SweepTask
// ---------------------------------------------------------------------------

/// On-demand work for the sweeper, in addition to its periodic sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTask {
    /// Sweep every shard now.
    RunAll,
    /// Sweep a single shard.
    RunShard { index: usize },
}

// ---------------------------------------------------------------------------
// StaleSweeper
// ---------------------------------------------------------------------------

/// Runnable that purges stale tables from a [`RequestStore`].
pub struct StaleSweeper {
    store: Arc<RequestStore>,
    max_age_secs: i64,
    purged_total: u64,
}

impl StaleSweeper {
    /// Creates a sweeper purging tables older than `max_age_secs` from `store`.
    #[must_use]
    pub fn new(store: Arc<RequestStore>, max_age_secs: i64) -> Self {
        Self {
            store,
            max_age_secs,
            purged_total: 0,
        }
    }

    /// Tables purged since this sweeper was created.
    #[must_use]
    pub fn purged_total(&self) -> u64 {
        self.purged_total
    }

    /// Sweeps every shard once and returns the number of tables removed.
    pub fn sweep(&mut self) -> usize {
        let purged = self.store.purge(self.max_age_secs);
        self.record(purged);
        purged
    }

    fn record(&mut self, purged: usize) {
        if purged == 0 {
            return;
        }
        let purged = purged as u64;
        self.purged_total += purged;
        metrics::counter!(PURGED_COUNTER).increment(purged);
    }
}

#[async_trait]
impl BackgroundRunnable for StaleSweeper {
    type Task = SweepTask;

    async fn run(&mut self, task: SweepTask) {
        match task {
            SweepTask::RunAll => {
                let purged = self.sweep();
                debug!(purged, "on-demand sweep complete");
            }
            SweepTask::RunShard { index } => {
                match self.store.purge_shard(index, self.max_age_secs) {
                    Ok(purged) => self.record(purged),
                    Err(e) => warn!(error = %e, "shard sweep rejected"),
                }
            }
        }
    }

    async fn on_tick(&mut self) {
        let purged = self.sweep();
        debug!(purged, remaining = self.store.len(), "periodic sweep complete");
    }

    async fn shutdown(&mut self) {
        info!(purged_total = self.purged_total, "stale sweeper stopped");
    }
}

/// Starts a sweeper over `store` if `config` enables one.
///
/// Must be called from within a tokio runtime. Returns `Ok(None)` when the
/// sweeper is disabled.
///
/// # Errors
///
/// Returns [`ConfigError::ZeroSweepInterval`] for an enabled sweeper with a
/// zero interval.
pub fn spawn_sweeper(
    store: Arc<RequestStore>,
    config: &SweeperConfig,
) -> Result<Option<BackgroundWorker<StaleSweeper>>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }
    if config.interval.is_zero() {
        return Err(ConfigError::ZeroSweepInterval);
    }
    info!(
        interval_secs = config.interval.as_secs(),
        max_age_secs = config.max_age_secs,
        "starting stale sweeper"
    );
    let sweeper = StaleSweeper::new(store, config.max_age_secs);
    Ok(Some(BackgroundWorker::start(sweeper, config.interval)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
