//! Workflow history events

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::millis;
use super::ActivityOptions;

/// Types of timeouts that can occur
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutType {
    /// Activity was not claimed within schedule_to_start_timeout
    ScheduleToStart,

    /// Activity (or the whole execution) did not finish within its start-to-close bound
    StartToClose,

    /// Worker did not send heartbeat within heartbeat_timeout
    Heartbeat,
}

impl fmt::Display for TimeoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutType::ScheduleToStart => "SCHEDULE_TO_START",
            TimeoutType::StartToClose => "START_TO_CLOSE",
            TimeoutType::Heartbeat => "HEARTBEAT",
        };
        f.write_str(s)
    }
}

/// How a closed run ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseStatus {
    Completed,
    Failed,
    TimedOut,
    Terminated,
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseStatus::Completed => "COMPLETED",
            CloseStatus::Failed => "FAILED",
            CloseStatus::TimedOut => "TIMED_OUT",
            CloseStatus::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// Events in a run's append-only history
///
/// The history is the only record of what happened to a run. Workflow state is
/// rebuilt by replaying it from the first event, and everything the facade
/// reports (status, timeline) is folded from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    // =========================================================================
    // Workflow Lifecycle Events
    // =========================================================================
    /// Run was started with the given input
    WorkflowExecutionStarted {
        workflow_type: String,
        task_list: String,
        input: serde_json::Value,
        #[serde(with = "millis")]
        execution_timeout: Duration,
        #[serde(with = "millis")]
        decision_timeout: Duration,
        identity: String,
    },

    /// Run completed successfully
    WorkflowExecutionCompleted { result: serde_json::Value },

    /// Run failed; `reason` is the workflow's own failure message
    WorkflowExecutionFailed {
        reason: String,
        details: Option<serde_json::Value>,
    },

    /// Run exceeded its execution timeout
    WorkflowExecutionTimedOut { timeout_type: TimeoutType },

    /// Run was terminated from outside
    WorkflowExecutionTerminated { reason: String, identity: String },

    // =========================================================================
    // Decision Events
    // =========================================================================
    /// New events are waiting to be handed to the workflow
    DecisionTaskScheduled { task_list: String },

    /// A replay of the workflow began
    DecisionTaskStarted { identity: String },

    /// The replay finished; events after this one are its actions
    DecisionTaskCompleted,

    // =========================================================================
    // Activity Lifecycle Events
    // =========================================================================
    /// Activity was scheduled for execution
    ActivityTaskScheduled {
        activity_id: String,
        activity_type: String,
        task_list: String,
        input: serde_json::Value,
        options: ActivityOptions,
    },

    /// Activity was claimed by a worker (first attempt only)
    ActivityTaskStarted {
        activity_id: String,
        attempt: u32,
        identity: String,
    },

    /// Activity completed successfully
    ActivityTaskCompleted {
        activity_id: String,
        result: serde_json::Value,
    },

    /// Activity failed after its retry policy was exhausted
    ActivityTaskFailed {
        activity_id: String,
        reason: String,
        details: Option<serde_json::Value>,
    },

    /// Activity exceeded one of its timeouts
    ActivityTaskTimedOut {
        activity_id: String,
        timeout_type: TimeoutType,
    },
}

impl WorkflowEvent {
    /// Wire name of the event, as reported in histories
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowExecutionStarted { .. } => "WorkflowExecutionStarted",
            WorkflowEvent::WorkflowExecutionCompleted { .. } => "WorkflowExecutionCompleted",
            WorkflowEvent::WorkflowExecutionFailed { .. } => "WorkflowExecutionFailed",
            WorkflowEvent::WorkflowExecutionTimedOut { .. } => "WorkflowExecutionTimedOut",
            WorkflowEvent::WorkflowExecutionTerminated { .. } => "WorkflowExecutionTerminated",
            WorkflowEvent::DecisionTaskScheduled { .. } => "DecisionTaskScheduled",
            WorkflowEvent::DecisionTaskStarted { .. } => "DecisionTaskStarted",
            WorkflowEvent::DecisionTaskCompleted => "DecisionTaskCompleted",
            WorkflowEvent::ActivityTaskScheduled { .. } => "ActivityTaskScheduled",
            WorkflowEvent::ActivityTaskStarted { .. } => "ActivityTaskStarted",
            WorkflowEvent::ActivityTaskCompleted { .. } => "ActivityTaskCompleted",
            WorkflowEvent::ActivityTaskFailed { .. } => "ActivityTaskFailed",
            WorkflowEvent::ActivityTaskTimedOut { .. } => "ActivityTaskTimedOut",
        }
    }

    /// Get the activity ID if this is an activity event
    pub fn activity_id(&self) -> Option<&str> {
        match self {
            WorkflowEvent::ActivityTaskScheduled { activity_id, .. }
            | WorkflowEvent::ActivityTaskStarted { activity_id, .. }
            | WorkflowEvent::ActivityTaskCompleted { activity_id, .. }
            | WorkflowEvent::ActivityTaskFailed { activity_id, .. }
            | WorkflowEvent::ActivityTaskTimedOut { activity_id, .. } => Some(activity_id),
            _ => None,
        }
    }

    /// The close status this event puts the run in, if it is terminal
    pub fn close_status(&self) -> Option<CloseStatus> {
        match self {
            WorkflowEvent::WorkflowExecutionCompleted { .. } => Some(CloseStatus::Completed),
            WorkflowEvent::WorkflowExecutionFailed { .. } => Some(CloseStatus::Failed),
            WorkflowEvent::WorkflowExecutionTimedOut { .. } => Some(CloseStatus::TimedOut),
            WorkflowEvent::WorkflowExecutionTerminated { .. } => Some(CloseStatus::Terminated),
            _ => None,
        }
    }

    /// Check if this event closes the run
    pub fn is_terminal(&self) -> bool {
        self.close_status().is_some()
    }
}

/// An event as stored in a run's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEvent {
    /// 1-based position in the history, without gaps
    pub event_id: i64,

    /// Never earlier than the previous event's timestamp
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub event: WorkflowEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::ActivityTaskCompleted {
            activity_id: "0".to_string(),
            result: json!("Hello Ada!"),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"activity_task_completed\""));

        let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            WorkflowEvent::DecisionTaskCompleted.name(),
            "DecisionTaskCompleted"
        );
        let failed = WorkflowEvent::WorkflowExecutionFailed {
            reason: "boom".to_string(),
            details: None,
        };
        assert_eq!(failed.name(), "WorkflowExecutionFailed");
    }

    #[test]
    fn test_is_terminal() {
        assert!(WorkflowEvent::WorkflowExecutionCompleted { result: json!(null) }.is_terminal());
        assert!(WorkflowEvent::WorkflowExecutionTimedOut {
            timeout_type: TimeoutType::StartToClose
        }
        .is_terminal());
        assert!(!WorkflowEvent::DecisionTaskCompleted.is_terminal());
        assert!(!WorkflowEvent::ActivityTaskFailed {
            activity_id: "0".to_string(),
            reason: "boom".to_string(),
            details: None,
        }
        .is_terminal());
    }

    #[test]
    fn test_activity_id_extraction() {
        let event = WorkflowEvent::ActivityTaskStarted {
            activity_id: "0".to_string(),
            attempt: 1,
            identity: "test-worker".to_string(),
        };
        assert_eq!(event.activity_id(), Some("0"));
        assert_eq!(WorkflowEvent::DecisionTaskCompleted.activity_id(), None);
    }

    #[test]
    fn test_history_event_flattens_payload() {
        let event = HistoryEvent {
            event_id: 3,
            timestamp: Utc::now(),
            event: WorkflowEvent::DecisionTaskStarted {
                identity: "test-worker".to_string(),
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_id"], 3);
        assert_eq!(value["type"], "decision_task_started");
        assert_eq!(value["identity"], "test-worker");
    }

    #[test]
    fn test_timeout_type_display() {
        assert_eq!(TimeoutType::StartToClose.to_string(), "START_TO_CLOSE");
        assert_eq!(CloseStatus::TimedOut.to_string(), "TIMED_OUT");
    }
}
