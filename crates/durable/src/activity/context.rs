//! Per-attempt activity context

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Why a heartbeat could not be delivered
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    /// The worker stopped watching this attempt
    #[error("worker is no longer watching this attempt")]
    WorkerGone,

    #[error("activity was cancelled")]
    Cancelled,
}

/// What an activity sees of the attempt it runs in
///
/// Heartbeats reset the worker's heartbeat watchdog. The worker flips the
/// cancellation flag when the attempt runs out of time; long activities should
/// watch [`ActivityContext::cancelled`].
#[derive(Debug)]
pub struct ActivityContext {
    pub task_id: Uuid,
    pub workflow_id: String,
    pub run_id: Uuid,
    pub activity_id: String,
    /// 1-based
    pub attempt: u32,
    pub max_attempts: u32,

    heartbeats: Option<mpsc::Sender<Option<Value>>>,
    cancel_rx: watch::Receiver<bool>,
    cancel: CancellationHandle,
}

impl ActivityContext {
    pub fn new(
        task_id: Uuid,
        workflow_id: impl Into<String>,
        run_id: Uuid,
        activity_id: impl Into<String>,
        attempt: u32,
        max_attempts: u32,
    ) -> Self {
        let (tx, cancel_rx) = watch::channel(false);
        Self {
            task_id,
            workflow_id: workflow_id.into(),
            run_id,
            activity_id: activity_id.into(),
            attempt,
            max_attempts,
            heartbeats: None,
            cancel_rx,
            cancel: CancellationHandle { tx: Arc::new(tx) },
        }
    }

    /// Route heartbeats to the worker watching this attempt
    pub fn with_heartbeat(mut self, heartbeats: mpsc::Sender<Option<Value>>) -> Self {
        self.heartbeats = Some(heartbeats);
        self
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Report liveness, optionally with progress details
    ///
    /// Without a watching worker this is a no-op.
    pub async fn heartbeat(&self, details: Option<Value>) -> Result<(), HeartbeatError> {
        if self.is_cancelled() {
            return Err(HeartbeatError::Cancelled);
        }
        match &self.heartbeats {
            Some(tx) => tx.send(details).await.map_err(|_| HeartbeatError::WorkerGone),
            None => Ok(()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once the attempt is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        // The sender lives in `self.cancel`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Cancels the attempt it was taken from
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}
