//! The workflow trait and the error a run fails with

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::WorkflowAction;
use crate::activity::ActivityError;

/// Error a workflow closes its run with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowError {
    /// Failure reason, recorded on the `WorkflowExecutionFailed` event
    pub reason: String,

    /// Optional structured details
    pub details: Option<serde_json::Value>,
}

impl WorkflowError {
    /// Create a new workflow error
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&ActivityError> for WorkflowError {
    fn from(err: &ActivityError) -> Self {
        Self {
            reason: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for WorkflowError {}

/// Deterministic state machine behind a workflow type
///
/// Nothing about a running workflow is kept in memory between decisions. Each
/// decision builds a fresh instance with [`Workflow::new`] and feeds it the
/// whole history; handlers must therefore return the same actions for the
/// same events and leave clocks, randomness and I/O to activities.
pub trait Workflow: Send + Sync + 'static {
    /// Name recorded on `WorkflowExecutionStarted` and looked up on replay
    const TYPE: &'static str;

    type Input: Serialize + DeserializeOwned + Send + Clone;
    type Output: Serialize + DeserializeOwned + Send;

    fn new(input: Self::Input) -> Self;

    /// `WorkflowExecutionStarted`
    fn on_start(&mut self) -> Vec<WorkflowAction>;

    /// `ActivityTaskCompleted`
    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction>;

    /// `ActivityTaskFailed`, and `ActivityTaskTimedOut` as a timeout error
    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction>;

    fn is_completed(&self) -> bool;

    /// Set once the workflow has completed
    fn result(&self) -> Option<Self::Output>;

    /// Set once the workflow has failed
    fn error(&self) -> Option<WorkflowError> {
        None
    }
}
