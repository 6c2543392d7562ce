//! Activity trait and attempt errors

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::ActivityContext;
use crate::workflow::TimeoutType;

/// Failure of one activity attempt
///
/// `message` becomes the `reason` of `ActivityTaskFailed`. `error_type` is
/// matched against the retry policy's non-retryable list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ActivityError {
    pub message: String,
    pub error_type: Option<String>,
    pub retryable: bool,
    pub details: Option<serde_json::Value>,
}

impl ActivityError {
    fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable,
            details: None,
        }
    }

    /// Transient failure; retried while the policy has attempts left
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(message, true)
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::new(message, false)
    }

    /// Attempt ran out of time
    ///
    /// Schedule-to-start timeouts are final: the task never reached a worker,
    /// so another attempt would wait on the same empty task list.
    pub fn timed_out(timeout_type: TimeoutType) -> Self {
        Self::new(
            format!("activity timed out: {timeout_type}"),
            timeout_type != TimeoutType::ScheduleToStart,
        )
        .with_type(format!("TIMEOUT_{timeout_type}"))
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<anyhow::Error> for ActivityError {
    fn from(err: anyhow::Error) -> Self {
        Self::retryable(format!("{err:#}"))
    }
}

/// Side-effecting work scheduled by a workflow and run by a [`WorkerPool`]
///
/// Workers route claimed tasks to implementations by [`Activity::TYPE`].
/// Each attempt is bounded by its start-to-close timeout and, when set, a
/// heartbeat timeout; see [`ActivityContext::heartbeat`].
///
/// [`WorkerPool`]: crate::worker::WorkerPool
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    const TYPE: &'static str;

    type Input: Serialize + DeserializeOwned + Send;

    type Output: Serialize + DeserializeOwned + Send;

    /// Run one attempt
    ///
    /// Return [`ActivityError::retryable`] for failures worth another attempt
    /// and [`ActivityError::non_retryable`] for the rest.
    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError>;
}
