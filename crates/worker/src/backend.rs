// ExecutionBackend over the bundled durable engine
// Decision: Snapshots (status, close time, history length) are folded from the history
// Decision: Page tokens are the next event ID to read, as decimal strings

use std::sync::Arc;

use async_trait::async_trait;
use flowgate_core::{
    fold_history, ActivityAttempt, ActivityState, BackendError, EventType, Execution,
    ExecutionBackend, ExecutionDescription, HistoryPage, ListPartition, StartRequest,
    StartedExecution, TimeWindow,
};
use flowgate_durable::persistence::{ActivityTaskInfo, ExecutionFilter, ExecutionRecord, TaskStatus};
use flowgate_durable::{
    ExecutorError, StartWorkflowOptions, StoreError, WorkflowEvent, WorkflowExecutor,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

/// Facade backend served by an in-process [`WorkflowExecutor`]
#[derive(Clone)]
pub struct DurableBackend {
    executor: Arc<WorkflowExecutor>,
}

impl DurableBackend {
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor> {
        &self.executor
    }

    async fn record(&self, id: &str, run_id: Option<&str>) -> Result<ExecutionRecord, BackendError> {
        let run_id = match run_id {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                BackendError::NotFound(format!("{} (run {})", id, raw))
            })?),
            None => None,
        };
        self.executor
            .store()
            .get_execution(id, run_id)
            .await
            .map_err(store_error)
    }

    async fn fold(&self, record: &ExecutionRecord) -> Result<Execution, BackendError> {
        let events = self
            .executor
            .store()
            .load_events(record.run_id)
            .await
            .map_err(store_error)?;
        let events: Vec<_> = events.iter().map(to_core_event).collect();
        fold_history(&record.workflow_id, &record.run_id.to_string(), &events)
            .map_err(|e| BackendError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for DurableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableBackend")
            .field("identity", &self.executor.identity())
            .finish()
    }
}

#[async_trait]
impl ExecutionBackend for DurableBackend {
    async fn start_execution(
        &self,
        request: StartRequest,
    ) -> Result<StartedExecution, BackendError> {
        let options = StartWorkflowOptions::new(
            request.workflow_id.clone(),
            request.workflow_type,
            request.input,
        )
        .with_task_list(request.task_list)
        .with_execution_timeout(request.execution_timeout)
        .with_decision_timeout(request.decision_timeout);

        let run_id = self
            .executor
            .start_workflow(options)
            .await
            .map_err(executor_error)?;

        Ok(StartedExecution {
            id: request.workflow_id,
            run_id: run_id.to_string(),
        })
    }

    async fn list_executions(
        &self,
        partition: ListPartition,
        window: TimeWindow,
        page_size: usize,
    ) -> Result<Vec<Execution>, BackendError> {
        let filter = match partition {
            ListPartition::Open => ExecutionFilter::open(),
            ListPartition::Closed => ExecutionFilter::closed(),
        }
        .started_between(window.earliest, window.latest)
        .with_limit(page_size);

        let records = self
            .executor
            .store()
            .list_executions(&filter)
            .await
            .map_err(store_error)?;

        let mut executions = Vec::with_capacity(records.len());
        for record in &records {
            executions.push(self.fold(record).await?);
        }
        debug!(%partition, count = executions.len(), "Folded executions");
        Ok(executions)
    }

    async fn describe_execution(
        &self,
        id: &str,
        run_id: Option<&str>,
    ) -> Result<ExecutionDescription, BackendError> {
        let record = self.record(id, run_id).await?;
        let execution = self.fold(&record).await?;
        let pending = self
            .executor
            .store()
            .pending_activities(record.run_id)
            .await
            .map_err(store_error)?;

        Ok(ExecutionDescription {
            execution,
            pending_activities: pending.iter().map(to_attempt).collect(),
        })
    }

    async fn get_history_page(
        &self,
        id: &str,
        run_id: Option<&str>,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<HistoryPage, BackendError> {
        let record = self.record(id, run_id).await?;
        let from = match page_token {
            Some(token) => token
                .parse::<i64>()
                .ok()
                .filter(|next| *next >= 1)
                .ok_or_else(|| BackendError::Internal(format!("invalid page token: {}", token)))?,
            None => 1,
        };

        let events = self
            .executor
            .store()
            .read_history(record.run_id, from, page_size.max(1))
            .await
            .map_err(store_error)?;

        let next_page_token = match events.last() {
            Some(last) if events.len() == page_size.max(1) => Some((last.event_id + 1).to_string()),
            _ => None,
        };

        Ok(HistoryPage {
            events: events.iter().map(to_core_event).collect(),
            next_page_token,
        })
    }
}

fn store_error(err: StoreError) -> BackendError {
    match err {
        StoreError::ExecutionNotFound { .. } | StoreError::RunNotFound(_) => {
            BackendError::NotFound(err.to_string())
        }
        StoreError::AlreadyStarted { workflow_id, .. } => BackendError::AlreadyStarted(workflow_id),
        other => BackendError::Internal(other.to_string()),
    }
}

fn executor_error(err: ExecutorError) -> BackendError {
    match err {
        ExecutorError::Store(e) => store_error(e),
        other => BackendError::Internal(other.to_string()),
    }
}

fn to_attempt(task: &ActivityTaskInfo) -> ActivityAttempt {
    ActivityAttempt {
        activity_id: task.activity_id.clone(),
        activity_type: task.activity_type.clone(),
        state: match task.status {
            TaskStatus::Scheduled => ActivityState::Scheduled,
            TaskStatus::Started => ActivityState::Started,
            TaskStatus::Completed => ActivityState::Completed,
            TaskStatus::Failed => ActivityState::Failed,
            TaskStatus::TimedOut => ActivityState::TimedOut,
            TaskStatus::Canceled => ActivityState::Canceled,
        },
        attempt_number: task.attempt,
        scheduled_time: Some(task.scheduled_time),
        last_started_time: task.last_started_time,
    }
}

/// Engine event in the facade's event shape, attributes in camelCase
pub fn to_core_event(event: &flowgate_durable::HistoryEvent) -> flowgate_core::HistoryEvent {
    flowgate_core::HistoryEvent::new(
        event.event_id,
        EventType::from_name(event.event.name()),
        event.timestamp,
        attributes(&event.event),
    )
}

fn attributes(event: &WorkflowEvent) -> Value {
    match event {
        WorkflowEvent::WorkflowExecutionStarted {
            workflow_type,
            task_list,
            input,
            execution_timeout,
            decision_timeout,
            identity,
        } => json!({
            "workflowType": workflow_type,
            "taskList": task_list,
            "input": input,
            "executionStartToCloseTimeoutSeconds": execution_timeout.as_secs(),
            "taskStartToCloseTimeoutSeconds": decision_timeout.as_secs(),
            "identity": identity,
        }),
        WorkflowEvent::WorkflowExecutionCompleted { result } => json!({ "result": result }),
        WorkflowEvent::WorkflowExecutionFailed { reason, details } => {
            with_details(json!({ "reason": reason }), details)
        }
        WorkflowEvent::WorkflowExecutionTimedOut { timeout_type } => {
            json!({ "timeoutType": timeout_type.to_string() })
        }
        WorkflowEvent::WorkflowExecutionTerminated { reason, identity } => {
            json!({ "reason": reason, "identity": identity })
        }
        WorkflowEvent::DecisionTaskScheduled { task_list } => json!({ "taskList": task_list }),
        WorkflowEvent::DecisionTaskStarted { identity } => json!({ "identity": identity }),
        WorkflowEvent::DecisionTaskCompleted => json!({}),
        WorkflowEvent::ActivityTaskScheduled {
            activity_id,
            activity_type,
            task_list,
            input,
            options,
        } => {
            let mut attrs = json!({
                "activityId": activity_id,
                "activityType": activity_type,
                "taskList": task_list,
                "input": input,
                "scheduleToStartTimeoutSeconds": options.schedule_to_start_timeout.as_secs(),
                "startToCloseTimeoutSeconds": options.start_to_close_timeout.as_secs(),
            });
            if let (Some(heartbeat), Some(map)) = (options.heartbeat_timeout, attrs.as_object_mut()) {
                map.insert("heartbeatTimeoutSeconds".into(), json!(heartbeat.as_secs()));
            }
            attrs
        }
        WorkflowEvent::ActivityTaskStarted {
            activity_id,
            attempt,
            identity,
        } => json!({
            "activityId": activity_id,
            "attempt": attempt,
            "identity": identity,
        }),
        WorkflowEvent::ActivityTaskCompleted {
            activity_id,
            result,
        } => json!({ "activityId": activity_id, "result": result }),
        WorkflowEvent::ActivityTaskFailed {
            activity_id,
            reason,
            details,
        } => with_details(json!({ "activityId": activity_id, "reason": reason }), details),
        WorkflowEvent::ActivityTaskTimedOut {
            activity_id,
            timeout_type,
        } => json!({
            "activityId": activity_id,
            "timeoutType": timeout_type.to_string(),
        }),
    }
}

fn with_details(mut attrs: Value, details: &Option<Value>) -> Value {
    if let (Some(details), Some(map)) = (details, attrs.as_object_mut()) {
        map.insert("details".into(), details.clone());
    }
    attrs
}
