// Execution domain types
//
// These types represent one workflow run and its status.
// Used by the gateway, the backend adapter and the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Execution status.
/// - `RUNNING`: no terminal event recorded yet
/// - every other value is terminal and final for the run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Run is open.
    Running,
    /// Run finished successfully.
    Completed,
    /// Run failed.
    Failed,
    /// Run exceeded its execution timeout.
    TimedOut,
    /// Run was canceled.
    Canceled,
    /// Run was terminated from outside.
    Terminated,
    /// Run was closed and continued as a new run.
    ContinuedAsNew,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::TimedOut => "TIMED_OUT",
            ExecutionStatus::Canceled => "CANCELED",
            ExecutionStatus::Terminated => "TERMINATED",
            ExecutionStatus::ContinuedAsNew => "CONTINUED_AS_NEW",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution - one run of a workflow, identified by `(id, run_id)`.
///
/// `close_time` is set exactly when `status` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Caller-visible workflow ID.
    pub id: String,
    /// Backend-assigned run ID.
    pub run_id: String,
    /// Registered workflow type name.
    pub workflow_type: String,
    /// Timestamp of the WorkflowExecutionStarted event.
    pub start_time: DateTime<Utc>,
    /// Timestamp of the first terminal event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    /// Number of history events.
    pub history_length: usize,
}

impl Execution {
    /// Wall time spent in the run: `close_time - start_time` for closed
    /// runs, `now - start_time` for open ones. Never negative.
    pub fn execution_time(&self, now: DateTime<Utc>) -> chrono::Duration {
        let end = self.close_time.unwrap_or(now);
        (end - self.start_time).max(chrono::Duration::zero())
    }

    pub fn is_open(&self) -> bool {
        self.status == ExecutionStatus::Running
    }
}
