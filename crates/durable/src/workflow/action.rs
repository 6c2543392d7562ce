//! What a decision can ask the engine to do

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{millis, WorkflowError};
use crate::reliability::RetryPolicy;

/// Command produced by a workflow handler
///
/// New actions are written to the history right after the
/// `DecisionTaskCompleted` of the decision that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowAction {
    /// Becomes `ActivityTaskScheduled` plus a task on the run's task list
    ScheduleActivity {
        /// Unique within the run; outcomes are reported against it
        activity_id: String,
        activity_type: String,
        input: Value,
        options: ActivityOptions,
    },

    /// Becomes `WorkflowExecutionCompleted`
    CompleteWorkflow { result: Value },

    /// Becomes `WorkflowExecutionFailed`
    FailWorkflow { error: WorkflowError },
}

impl WorkflowAction {
    pub fn schedule_activity(
        activity_id: impl Into<String>,
        activity_type: impl Into<String>,
        input: Value,
    ) -> Self {
        Self::ScheduleActivity {
            activity_id: activity_id.into(),
            activity_type: activity_type.into(),
            input,
            options: ActivityOptions::default(),
        }
    }

    pub fn complete(result: Value) -> Self {
        Self::CompleteWorkflow { result }
    }

    pub fn fail(error: WorkflowError) -> Self {
        Self::FailWorkflow { error }
    }

    /// Replace the options of a schedule action; no-op for the others
    pub fn with_options(mut self, new_options: ActivityOptions) -> Self {
        if let Self::ScheduleActivity { options, .. } = &mut self {
            *options = new_options;
        }
        self
    }

    /// Whether the action closes the run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::ScheduleActivity { .. })
    }
}

/// Timeouts and retries for one scheduled activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityOptions {
    /// Single attempt unless overridden
    pub retry_policy: RetryPolicy,

    /// Longest a task may sit on the task list before a worker claims it
    #[serde(with = "millis")]
    pub schedule_to_start_timeout: Duration,

    /// Longest one attempt may run once claimed
    #[serde(with = "millis")]
    pub start_to_close_timeout: Duration,

    /// Longest gap allowed between heartbeats; `None` disables the watchdog
    #[serde(with = "millis::option")]
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::no_retry(),
            schedule_to_start_timeout: Duration::from_secs(60),
            start_to_close_timeout: Duration::from_secs(300),
            heartbeat_timeout: None,
        }
    }
}

impl ActivityOptions {
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_schedule_to_start_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_start_timeout = timeout;
        self
    }

    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_uses_single_attempt_by_default() {
        let WorkflowAction::ScheduleActivity {
            activity_id,
            options,
            ..
        } = WorkflowAction::schedule_activity("0", "greet", json!("Ada"))
        else {
            panic!("expected a schedule action");
        };

        assert_eq!(activity_id, "0");
        assert_eq!(options.retry_policy.max_attempts, 1);
        assert_eq!(options.heartbeat_timeout, None);
    }

    #[test]
    fn test_with_options_only_touches_schedule() {
        let options = ActivityOptions::default().with_heartbeat(Duration::from_secs(20));

        let action = WorkflowAction::schedule_activity("0", "greet", json!(null))
            .with_options(options.clone());
        assert!(matches!(
            action,
            WorkflowAction::ScheduleActivity { options: ref o, .. } if *o == options
        ));

        let complete = WorkflowAction::complete(json!("done")).with_options(options);
        assert_eq!(complete, WorkflowAction::complete(json!("done")));
    }

    #[test]
    fn test_terminal_actions() {
        assert!(WorkflowAction::complete(json!(1)).is_terminal());
        assert!(WorkflowAction::fail(WorkflowError::new("boom")).is_terminal());
        assert!(!WorkflowAction::schedule_activity("0", "greet", json!(null)).is_terminal());
    }

    #[test]
    fn test_timeouts_serialize_as_millis() {
        let options = ActivityOptions::default()
            .with_start_to_close_timeout(Duration::from_secs(60))
            .with_heartbeat(Duration::from_secs(20));

        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["start_to_close_timeout"], 60_000);
        assert_eq!(value["heartbeat_timeout"], 20_000);

        let value = serde_json::to_value(ActivityOptions::default()).unwrap();
        assert!(value["heartbeat_timeout"].is_null());

        let parsed: ActivityOptions = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, ActivityOptions::default());
    }
}
