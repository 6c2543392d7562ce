//! Builds workflows back from what their history recorded
//!
//! Histories only record a workflow's type name and JSON input, so replay
//! needs a way to build the concrete workflow back from those two.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::activity::ActivityError;
use crate::workflow::{Workflow, WorkflowAction, WorkflowEvent};

/// A workflow with its type erased, driven by raw history events
pub trait AnyWorkflow: Send + Sync {
    fn workflow_type(&self) -> &'static str;

    /// Feed one event to the matching handler
    ///
    /// `None` for events no handler reacts to (decision bookkeeping, activity
    /// scheduling and starts, run closure).
    fn apply(&mut self, event: &WorkflowEvent) -> Option<Vec<WorkflowAction>>;
}

impl<W: Workflow> AnyWorkflow for W {
    fn workflow_type(&self) -> &'static str {
        W::TYPE
    }

    fn apply(&mut self, event: &WorkflowEvent) -> Option<Vec<WorkflowAction>> {
        let actions = match event {
            WorkflowEvent::WorkflowExecutionStarted { .. } => self.on_start(),
            WorkflowEvent::ActivityTaskCompleted {
                activity_id,
                result,
            } => self.on_activity_completed(activity_id, result.clone()),
            WorkflowEvent::ActivityTaskFailed {
                activity_id,
                reason,
                details,
            } => {
                let mut error = ActivityError::non_retryable(reason.clone());
                error.details = details.clone();
                self.on_activity_failed(activity_id, &error)
            }
            WorkflowEvent::ActivityTaskTimedOut {
                activity_id,
                timeout_type,
            } => self.on_activity_failed(activity_id, &ActivityError::timed_out(*timeout_type)),
            _ => return None,
        };
        Some(actions)
    }
}

/// Builds a workflow from the input recorded on its start event
pub type WorkflowFactory =
    Box<dyn Fn(Value) -> Result<Box<dyn AnyWorkflow>, serde_json::Error> + Send + Sync>;

/// Registry of workflow factories, keyed by workflow type
pub struct WorkflowRegistry {
    factories: HashMap<String, WorkflowFactory>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Make `W` startable and replayable under `W::TYPE`
    ///
    /// Registering the same type twice keeps the later factory.
    pub fn register<W: Workflow>(&mut self) {
        let factory: WorkflowFactory = Box::new(|input: Value| {
            let input: W::Input = serde_json::from_value(input)?;
            Ok(Box::new(W::new(input)) as Box<dyn AnyWorkflow>)
        });
        self.factories.insert(W::TYPE.to_string(), factory);
    }

    pub fn contains(&self, workflow_type: &str) -> bool {
        self.factories.contains_key(workflow_type)
    }

    /// Fresh instance of `workflow_type`, built from its start input
    pub fn create(
        &self,
        workflow_type: &str,
        input: Value,
    ) -> Result<Box<dyn AnyWorkflow>, RegistryError> {
        let factory = self
            .factories
            .get(workflow_type)
            .ok_or_else(|| RegistryError::UnknownWorkflowType(workflow_type.to_string()))?;

        factory(input).map_err(RegistryError::Deserialization)
    }

    pub fn workflow_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|s| s.as_str())
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("workflow type {0:?} is not registered")]
    UnknownWorkflowType(String),

    /// Start input does not match the workflow's `Input` type
    #[error("workflow input does not fit the workflow type: {0}")]
    Deserialization(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{TimeoutType, WorkflowError};
    use serde_json::json;

    struct Echo {
        text: String,
        reply: Option<String>,
        failure: Option<String>,
    }

    impl Workflow for Echo {
        const TYPE: &'static str = "echo";
        type Input = String;
        type Output = String;

        fn new(text: String) -> Self {
            Self {
                text,
                reply: None,
                failure: None,
            }
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            vec![WorkflowAction::schedule_activity(
                "0",
                "echo_activity",
                json!(self.text),
            )]
        }

        fn on_activity_completed(&mut self, _activity_id: &str, result: Value) -> Vec<WorkflowAction> {
            self.reply = result.as_str().map(str::to_string);
            vec![WorkflowAction::complete(result)]
        }

        fn on_activity_failed(
            &mut self,
            _activity_id: &str,
            error: &ActivityError,
        ) -> Vec<WorkflowAction> {
            self.failure = Some(error.message.clone());
            vec![WorkflowAction::fail(WorkflowError::from(error))]
        }

        fn is_completed(&self) -> bool {
            self.reply.is_some() || self.failure.is_some()
        }

        fn result(&self) -> Option<String> {
            self.reply.clone()
        }

        fn error(&self) -> Option<WorkflowError> {
            self.failure.as_ref().map(WorkflowError::new)
        }
    }

    fn started(input: Value) -> WorkflowEvent {
        WorkflowEvent::WorkflowExecutionStarted {
            workflow_type: "echo".to_string(),
            task_list: "default".to_string(),
            input,
            execution_timeout: std::time::Duration::from_secs(60),
            decision_timeout: std::time::Duration::from_secs(10),
            identity: "test".to_string(),
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = WorkflowRegistry::new();
        registry.register::<Echo>();

        assert!(registry.contains("echo"));
        assert!(!registry.contains("unknown"));

        let workflow = registry.create("echo", json!("hi")).unwrap();
        assert_eq!(workflow.workflow_type(), "echo");
    }

    #[test]
    fn test_unknown_workflow_type() {
        let registry = WorkflowRegistry::new();
        let result = registry.create("unknown", json!({}));

        assert!(matches!(result, Err(RegistryError::UnknownWorkflowType(_))));
    }

    #[test]
    fn test_invalid_input() {
        let mut registry = WorkflowRegistry::new();
        registry.register::<Echo>();

        let result = registry.create("echo", json!({"not": "a string"}));
        assert!(matches!(result, Err(RegistryError::Deserialization(_))));
    }

    #[test]
    fn test_apply_routes_events_to_handlers() {
        let mut registry = WorkflowRegistry::new();
        registry.register::<Echo>();
        let mut workflow = registry.create("echo", json!("hi")).unwrap();

        let scheduled = workflow.apply(&started(json!("hi"))).unwrap();
        assert_eq!(scheduled.len(), 1);

        assert!(workflow
            .apply(&WorkflowEvent::DecisionTaskCompleted)
            .is_none());

        let done = workflow
            .apply(&WorkflowEvent::ActivityTaskCompleted {
                activity_id: "0".to_string(),
                result: json!("hi back"),
            })
            .unwrap();
        assert_eq!(done, vec![WorkflowAction::complete(json!("hi back"))]);
    }

    #[test]
    fn test_apply_turns_failures_into_activity_errors() {
        let mut registry = WorkflowRegistry::new();
        registry.register::<Echo>();

        let mut workflow = registry.create("echo", json!("hi")).unwrap();
        let failed = workflow
            .apply(&WorkflowEvent::ActivityTaskFailed {
                activity_id: "0".to_string(),
                reason: "boom".to_string(),
                details: Some(json!({"attempt": 1})),
            })
            .unwrap();
        assert_eq!(
            failed,
            vec![WorkflowAction::fail(
                WorkflowError::new("boom").with_details(json!({"attempt": 1}))
            )]
        );

        let mut workflow = registry.create("echo", json!("hi")).unwrap();
        let timed_out = workflow
            .apply(&WorkflowEvent::ActivityTaskTimedOut {
                activity_id: "0".to_string(),
                timeout_type: TimeoutType::StartToClose,
            })
            .unwrap();
        assert_eq!(timed_out.len(), 1);
        assert!(timed_out[0].is_terminal());
    }

    #[test]
    fn test_registry_debug() {
        let mut registry = WorkflowRegistry::new();
        registry.register::<Echo>();

        assert!(format!("{:?}", registry).contains("echo"));
        assert_eq!(registry.workflow_types().collect::<Vec<_>>(), vec!["echo"]);
    }
}
