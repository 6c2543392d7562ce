// Hello-world workflow and activity
// Decision: One activity, one attempt; an activity failure fails the run with the same reason

use std::time::Duration;

use async_trait::async_trait;
use flowgate_durable::prelude::*;
use serde_json::json;
use tracing::{debug, info};

/// Workflow type the facade starts
pub const WORKFLOW_TYPE: &str = "hello_world_workflow";

/// Activity type the workflow schedules
pub const ACTIVITY_TYPE: &str = "hello_world_activity";

const GREET_ACTIVITY_ID: &str = "0";

/// Options for the greeting activity
pub fn greeting_options() -> ActivityOptions {
    ActivityOptions::default()
        .with_schedule_to_start_timeout(Duration::from_secs(60))
        .with_start_to_close_timeout(Duration::from_secs(60))
        .with_heartbeat(Duration::from_secs(20))
}

#[derive(Debug)]
enum Stage {
    Pending,
    Greeting,
    Completed(String),
    Failed(WorkflowError),
}

/// Greets the name it was started with
///
/// Schedules `hello_world_activity` with the name, then completes with the
/// activity's result or fails with its error message.
#[derive(Debug)]
pub struct HelloWorldWorkflow {
    name: String,
    stage: Stage,
}

impl Workflow for HelloWorldWorkflow {
    const TYPE: &'static str = WORKFLOW_TYPE;
    type Input = String;
    type Output = String;

    fn new(name: String) -> Self {
        Self {
            name,
            stage: Stage::Pending,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        debug!(name = %self.name, "helloworld workflow started");
        self.stage = Stage::Greeting;
        vec![WorkflowAction::schedule_activity(
            GREET_ACTIVITY_ID,
            ACTIVITY_TYPE,
            json!(self.name),
        )
        .with_options(greeting_options())]
    }

    fn on_activity_completed(
        &mut self,
        _activity_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction> {
        match result.as_str() {
            Some(greeting) => {
                debug!(result = greeting, "helloworld workflow completed");
                self.stage = Stage::Completed(greeting.to_string());
                vec![WorkflowAction::complete(result)]
            }
            None => {
                let error = WorkflowError::new("activity returned a non-string result")
                    .with_details(result);
                self.stage = Stage::Failed(error.clone());
                vec![WorkflowAction::fail(error)]
            }
        }
    }

    fn on_activity_failed(&mut self, _activity_id: &str, error: &ActivityError) -> Vec<WorkflowAction> {
        debug!(error = %error, "Activity failed.");
        let error = WorkflowError::from(error);
        self.stage = Stage::Failed(error.clone());
        vec![WorkflowAction::fail(error)]
    }

    fn is_completed(&self) -> bool {
        matches!(self.stage, Stage::Completed(_) | Stage::Failed(_))
    }

    fn result(&self) -> Option<String> {
        match &self.stage {
            Stage::Completed(greeting) => Some(greeting.clone()),
            _ => None,
        }
    }

    fn error(&self) -> Option<WorkflowError> {
        match &self.stage {
            Stage::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }
}

/// Returns `"Hello <name>!"`
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloWorldActivity;

#[async_trait]
impl Activity for HelloWorldActivity {
    const TYPE: &'static str = ACTIVITY_TYPE;
    type Input = String;
    type Output = String;

    async fn execute(&self, ctx: &ActivityContext, name: String) -> Result<String, ActivityError> {
        info!(
            workflow_id = %ctx.workflow_id,
            attempt = ctx.attempt,
            name = %name,
            "helloworld activity started"
        );
        Ok(greeting(&name))
    }
}

pub fn greeting(name: &str) -> String {
    format!("Hello {}!", name)
}
