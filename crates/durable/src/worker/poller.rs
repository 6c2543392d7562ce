//! Activity task polling
//!
//! Claims activity tasks from one task list, backing off while it is empty.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, instrument, trace};

use crate::persistence::{ClaimedTask, StoreError, WorkflowEventStore};

/// How the poller paces claims on an idle task list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollerConfig {
    /// Delay after a poll that claimed something
    #[serde(with = "crate::workflow::millis")]
    pub min_interval: Duration,

    /// Ceiling for the idle delay
    #[serde(with = "crate::workflow::millis")]
    pub max_interval: Duration,

    /// Growth factor of the idle delay per empty poll
    pub backoff_multiplier: f64,

    /// Upper bound on tasks claimed by one poll
    pub batch_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            batch_size: 10,
        }
    }
}

impl PollerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Clamped to at least 1.0
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Clamped to at least 1
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    fn grow(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier).min(self.max_interval)
    }
}

/// Claims tasks for one worker from one task list
///
/// An empty poll stretches the delay before the next one by the backoff
/// multiplier; a poll that claims anything drops it back to the minimum.
pub struct TaskPoller {
    store: Arc<dyn WorkflowEventStore>,
    worker_id: String,
    task_list: String,
    activity_types: Vec<String>,
    config: PollerConfig,
    delay: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskPoller {
    pub fn new(
        store: Arc<dyn WorkflowEventStore>,
        worker_id: String,
        task_list: String,
        activity_types: Vec<String>,
        config: PollerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            worker_id,
            task_list,
            activity_types,
            delay: config.min_interval,
            config,
            shutdown_rx,
        }
    }

    /// Claim up to `max_tasks` (capped by the batch size)
    ///
    /// Claims nothing once shutdown has been signaled.
    #[instrument(skip(self), fields(worker_id = %self.worker_id, task_list = %self.task_list))]
    pub async fn poll(&mut self, max_tasks: usize) -> Result<Vec<ClaimedTask>, PollerError> {
        let limit = max_tasks.min(self.config.batch_size);
        if self.is_shutdown() || limit == 0 {
            return Ok(Vec::new());
        }

        let claimed = self
            .store
            .claim_tasks(&self.worker_id, &self.task_list, &self.activity_types, limit)
            .await?;

        self.delay = match claimed.len() {
            0 => self.config.grow(self.delay),
            n => {
                debug!(claimed = n, "Claimed activity tasks");
                self.config.min_interval
            }
        };
        trace!(delay_ms = self.delay.as_millis() as u64, "Next poll delay");

        Ok(claimed)
    }

    /// Sleep for the current delay
    ///
    /// Returns `true` when woken by shutdown instead.
    pub async fn wait(&mut self) -> bool {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => false,
            _ = shutdown_rx.changed() => true,
        }
    }

    pub fn current_interval(&self) -> Duration {
        self.delay
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("failed to claim tasks: {0}")]
    Store(#[from] StoreError),
}
