// History event types
//
// Backend-neutral history events. The event type is an open enum: names this
// crate knows get a variant, anything else is carried verbatim in `Other`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::execution::ExecutionStatus;

macro_rules! event_types {
    ($($variant:ident),+ $(,)?) => {
        /// History event type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum EventType {
            $($variant,)+
            /// Any event type name not listed above.
            Other(String),
        }

        impl EventType {
            pub fn as_str(&self) -> &str {
                match self {
                    $(EventType::$variant => stringify!($variant),)+
                    EventType::Other(name) => name,
                }
            }

            /// Parse an event type name; unknown names become `Other`.
            pub fn from_name(name: &str) -> Self {
                match name {
                    $(stringify!($variant) => EventType::$variant,)+
                    other => EventType::Other(other.to_string()),
                }
            }
        }
    };
}

event_types! {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionTimedOut,
    WorkflowExecutionCanceled,
    WorkflowExecutionTerminated,
    WorkflowExecutionContinuedAsNew,
    WorkflowExecutionSignaled,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskTimedOut,
    DecisionTaskFailed,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCanceled,
    TimerStarted,
    TimerFired,
}

impl EventType {
    /// Status a run takes when this event is recorded, if it closes the run
    pub fn terminal_status(&self) -> Option<ExecutionStatus> {
        match self {
            EventType::WorkflowExecutionCompleted => Some(ExecutionStatus::Completed),
            EventType::WorkflowExecutionFailed => Some(ExecutionStatus::Failed),
            EventType::WorkflowExecutionTimedOut => Some(ExecutionStatus::TimedOut),
            EventType::WorkflowExecutionCanceled => Some(ExecutionStatus::Canceled),
            EventType::WorkflowExecutionTerminated => Some(ExecutionStatus::Terminated),
            EventType::WorkflowExecutionContinuedAsNew => Some(ExecutionStatus::ContinuedAsNew),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventType::from_name(s))
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventType::from_name(&name))
    }
}

/// HistoryEvent - one entry of an execution's append-only event log.
///
/// `attributes` is a JSON object with camelCase keys (`workflowType`,
/// `activityType`, `reason`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// 1-based, contiguous, increasing.
    pub event_id: i64,
    pub event_type: EventType,
    /// Non-decreasing across the log.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl HistoryEvent {
    pub fn new(
        event_id: i64,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        attributes: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            event_type,
            timestamp,
            attributes,
        }
    }

    /// String attribute by key
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}
