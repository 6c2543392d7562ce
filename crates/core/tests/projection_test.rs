//! Property-based tests for the history projector
//!
//! Logs are generated the way a backend writes them: one start event, then a
//! run of bookkeeping events with the occasional terminal event mixed in.

use chrono::{DateTime, Duration, Utc};
use flowgate_core::projector::{details, HistoryFold};
use flowgate_core::{fold_history, timeline, EventType, ExecutionStatus, HistoryEvent};
use proptest::prelude::*;
use serde_json::json;

const NOISE: &[&str] = &[
    "DecisionTaskScheduled",
    "DecisionTaskStarted",
    "DecisionTaskCompleted",
    "ActivityTaskScheduled",
    "ActivityTaskStarted",
    "ActivityTaskCompleted",
    "ActivityTaskFailed",
    "ActivityTaskTimedOut",
    "TimerStarted",
    "MarkerRecorded",
];

const TERMINAL: &[&str] = &[
    "WorkflowExecutionCompleted",
    "WorkflowExecutionFailed",
    "WorkflowExecutionTimedOut",
    "WorkflowExecutionTerminated",
];

fn base() -> DateTime<Utc> {
    DateTime::from_timestamp(1_714_564_800, 0).unwrap()
}

/// Event name for one step after the start event; terminals are rarer
fn arb_step_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        5 => prop::sample::select(NOISE),
        1 => prop::sample::select(TERMINAL),
    ]
}

/// A start event followed by 1-24 steps with non-decreasing timestamps
fn arb_log() -> impl Strategy<Value = Vec<HistoryEvent>> {
    prop::collection::vec((arb_step_name(), 0i64..1_000), 1..24).prop_map(|steps| {
        let mut at = base();
        let mut events = vec![HistoryEvent::new(
            1,
            EventType::WorkflowExecutionStarted,
            at,
            json!({"workflowType": "hello_world_workflow"}),
        )];
        for (name, gap_ms) in steps {
            at += Duration::milliseconds(gap_ms);
            events.push(HistoryEvent::new(
                events.len() as i64 + 1,
                EventType::from_name(name),
                at,
                json!({"activityType": "hello_world_activity", "reason": "boom"}),
            ));
        }
        events
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// RUNNING until the first terminal event, which then fixes status and closeTime
    #[test]
    fn prop_first_terminal_event_wins(log in arb_log()) {
        let mut fold = HistoryFold::new();
        let mut first_terminal: Option<(ExecutionStatus, DateTime<Utc>)> = None;

        for event in &log {
            fold.push(event).unwrap();
            if first_terminal.is_none() {
                first_terminal = event.event_type.terminal_status().map(|s| (s, event.timestamp));
            }

            let exec = fold.finish("wf", "run").unwrap();
            match first_terminal {
                None => {
                    prop_assert_eq!(exec.status, ExecutionStatus::Running);
                    prop_assert_eq!(exec.close_time, None);
                }
                Some((status, at)) => {
                    prop_assert_eq!(exec.status, status);
                    prop_assert_eq!(exec.close_time, Some(at));
                }
            }
            prop_assert_eq!(exec.history_length as i64, event.event_id);
        }
    }

    #[test]
    fn prop_refolding_is_idempotent(log in arb_log()) {
        prop_assert_eq!(
            fold_history("wf", "run", &log).unwrap(),
            fold_history("wf", "run", &log).unwrap()
        );
    }

    /// Templated types always render details, everything else renders ""
    #[test]
    fn prop_details_are_total(log in arb_log()) {
        let entries = timeline(&log);
        prop_assert_eq!(entries.len(), log.len());

        for (entry, event) in entries.iter().zip(&log) {
            prop_assert_eq!(entry.event_id, event.event_id);
            let templated = matches!(
                event.event_type,
                EventType::WorkflowExecutionStarted
                    | EventType::ActivityTaskScheduled
                    | EventType::ActivityTaskStarted
                    | EventType::ActivityTaskCompleted
                    | EventType::ActivityTaskFailed
                    | EventType::WorkflowExecutionCompleted
                    | EventType::WorkflowExecutionFailed
            );
            prop_assert_eq!(!entry.details.is_empty(), templated);
            prop_assert_eq!(&entry.details, &details(event));
        }
    }

    #[test]
    fn prop_execution_time_stops_at_close(log in arb_log(), later_secs in 1i64..1_000_000) {
        let exec = fold_history("wf", "run", &log).unwrap();
        let later = exec.start_time + Duration::seconds(later_secs);

        match exec.close_time {
            Some(close) => {
                prop_assert_eq!(exec.execution_time(later + Duration::days(3)), close - exec.start_time);
            }
            None => {
                prop_assert!(exec.execution_time(later + Duration::seconds(1)) > exec.execution_time(later));
            }
        }
    }
}
