// Caller-visible execution views
//
// Execution snapshots rendered for the HTTP API, with `executionTime`
// recomputed against the caller's clock on every query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::duration::format_duration;
use crate::execution::{Execution, ExecutionStatus};
use crate::projector::PendingActivityView;

/// Execution as listed; `closeTime` is omitted while the run is open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_type: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    /// Go-style duration, e.g. "1m2.5s"
    pub execution_time: String,
    pub history_length: usize,
}

impl ExecutionView {
    pub fn new(execution: &Execution, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id: execution.id.clone(),
            run_id: execution.run_id.clone(),
            workflow_type: execution.workflow_type.clone(),
            start_time: execution.start_time,
            close_time: execution.close_time,
            status: execution.status,
            execution_time: format_duration(execution.execution_time(now)),
            history_length: execution.history_length,
        }
    }
}

/// Execution status response; `closeTime` is `null` while the run is open
/// and `pendingActivities` appears only when there are some.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetail {
    pub workflow_id: String,
    pub run_id: String,
    pub workflow_type: String,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub execution_time: String,
    pub history_length: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_activities: Vec<PendingActivityView>,
}

impl ExecutionDetail {
    pub fn new(
        execution: &Execution,
        pending_activities: Vec<PendingActivityView>,
        now: DateTime<Utc>,
    ) -> Self {
        let view = ExecutionView::new(execution, now);
        Self {
            workflow_id: view.workflow_id,
            run_id: view.run_id,
            workflow_type: view.workflow_type,
            start_time: view.start_time,
            close_time: view.close_time,
            status: view.status,
            execution_time: view.execution_time,
            history_length: view.history_length,
            pending_activities,
        }
    }
}
