// History Projector
//
// Pure functions that derive an execution snapshot and a display timeline
// from an execution's event log. Nothing here performs I/O; the same log
// always projects to the same result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::activity::{ActivityAttempt, ActivityState};
use crate::execution::{Execution, ExecutionStatus};
use crate::history::{EventType, HistoryEvent};

/// Errors raised when an event log violates its own invariants
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("history has no WorkflowExecutionStarted event")]
    MissingStartEvent,

    #[error("event {event_id} is missing attribute '{attribute}'")]
    MissingAttribute {
        event_id: i64,
        attribute: &'static str,
    },

    #[error("event ids are not contiguous: expected {expected}, found {found}")]
    NonContiguous { expected: i64, found: i64 },
}

/// Incremental fold over an event log
///
/// Feed events in order with [`push`](Self::push); [`finish`](Self::finish)
/// yields the snapshot for the prefix seen so far.
#[derive(Debug, Clone, Default)]
pub struct HistoryFold {
    start: Option<(DateTime<Utc>, String)>,
    close: Option<(ExecutionStatus, DateTime<Utc>)>,
    folded: usize,
}

impl HistoryFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &HistoryEvent) -> Result<(), ProjectionError> {
        let expected = self.folded as i64 + 1;
        if event.event_id != expected {
            return Err(ProjectionError::NonContiguous {
                expected,
                found: event.event_id,
            });
        }

        if event.event_type == EventType::WorkflowExecutionStarted && self.start.is_none() {
            let workflow_type =
                event
                    .attribute("workflowType")
                    .ok_or(ProjectionError::MissingAttribute {
                        event_id: event.event_id,
                        attribute: "workflowType",
                    })?;
            self.start = Some((event.timestamp, workflow_type.to_string()));
        }

        // First terminal event wins
        if self.close.is_none() {
            if let Some(status) = event.event_type.terminal_status() {
                self.close = Some((status, event.timestamp));
            }
        }

        self.folded += 1;
        Ok(())
    }

    pub fn history_length(&self) -> usize {
        self.folded
    }

    pub fn status(&self) -> ExecutionStatus {
        self.close
            .map(|(status, _)| status)
            .unwrap_or(ExecutionStatus::Running)
    }

    pub fn finish(
        &self,
        id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Result<Execution, ProjectionError> {
        let (start_time, workflow_type) =
            self.start.clone().ok_or(ProjectionError::MissingStartEvent)?;

        Ok(Execution {
            id: id.into(),
            run_id: run_id.into(),
            workflow_type,
            start_time,
            close_time: self.close.map(|(_, at)| at),
            status: self.status(),
            history_length: self.folded,
        })
    }
}

/// Fold a complete event log into an execution snapshot
pub fn fold_history(
    id: impl Into<String>,
    run_id: impl Into<String>,
    events: &[HistoryEvent],
) -> Result<Execution, ProjectionError> {
    let mut fold = HistoryFold::new();
    for event in events {
        fold.push(event)?;
    }
    fold.finish(id, run_id)
}

/// One line of the human-readable timeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub event_id: i64,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Empty for event types without a template
    pub details: String,
}

/// Human-readable description of an event, or `""` for untemplated types
///
/// A missing attribute leaves its placeholder empty.
pub fn details(event: &HistoryEvent) -> String {
    let attr = |key: &str| event.attribute(key).unwrap_or_default();
    match event.event_type {
        EventType::WorkflowExecutionStarted => "Workflow started with input".to_string(),
        EventType::ActivityTaskScheduled => format!("Activity: {}", attr("activityType")),
        EventType::ActivityTaskStarted => "Activity execution started".to_string(),
        EventType::ActivityTaskCompleted => "Activity completed successfully".to_string(),
        EventType::ActivityTaskFailed => format!("Activity failed: {}", attr("reason")),
        EventType::WorkflowExecutionCompleted => "Workflow completed successfully".to_string(),
        EventType::WorkflowExecutionFailed => format!("Workflow failed: {}", attr("reason")),
        _ => String::new(),
    }
}

pub fn timeline_entry(event: &HistoryEvent) -> TimelineEntry {
    TimelineEntry {
        event_id: event.event_id,
        event_type: event.event_type.clone(),
        timestamp: event.timestamp,
        details: details(event),
    }
}

/// Project an event log into display records, one per event
pub fn timeline(events: &[HistoryEvent]) -> Vec<TimelineEntry> {
    events.iter().map(timeline_entry).collect()
}

/// Pending activity as shown to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PendingActivityView {
    pub activity_id: String,
    pub activity_type: String,
    pub state: ActivityState,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_started_time: Option<DateTime<Utc>>,
}

/// Keep the non-terminal attempts from a live attempt table
pub fn pending_activities(attempts: &[ActivityAttempt]) -> Vec<PendingActivityView> {
    attempts
        .iter()
        .filter(|a| a.is_pending())
        .map(|a| PendingActivityView {
            activity_id: a.activity_id.clone(),
            activity_type: a.activity_type.clone(),
            state: a.state,
            attempt: a.attempt_number,
            scheduled_time: a.scheduled_time,
            last_started_time: a.last_started_time,
        })
        .collect()
}
