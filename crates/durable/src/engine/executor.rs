//! Workflow executor with replay support
//!
//! The `WorkflowExecutor` is responsible for:
//! - Starting new runs
//! - Running decisions: replaying a run's history and recording new actions
//! - Recording activity outcomes reported by workers
//! - Enforcing execution and schedule-to-start timeouts
//! - Terminating runs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::activity::ActivityError;
use crate::persistence::{
    ClaimedTask, ExecutionFilter, NewExecution, StoreError, TaskDefinition, TaskFailureOutcome,
    WorkflowEventStore,
};
use crate::workflow::{CloseStatus, HistoryEvent, TimeoutType, Workflow, WorkflowAction, WorkflowEvent};

use super::registry::{AnyWorkflow, RegistryError, WorkflowRegistry};

/// Configuration for the workflow executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Identity recorded on decision and termination events
    pub identity: String,

    /// Maximum events per run (for safety)
    pub max_events_per_workflow: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            identity: "flowgate-engine".to_string(),
            max_events_per_workflow: 10_000,
        }
    }
}

impl ExecutorConfig {
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

/// Parameters for starting a run
#[derive(Debug, Clone)]
pub struct StartWorkflowOptions {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_list: String,
    pub input: serde_json::Value,
    /// Bound on the whole run, enforced by [`WorkflowExecutor::enforce_timeouts`]
    pub execution_timeout: Duration,
    /// Recorded on the start event; decisions run in-process and are not timed
    pub decision_timeout: Duration,
}

impl StartWorkflowOptions {
    pub fn new(
        workflow_id: impl Into<String>,
        workflow_type: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_type: workflow_type.into(),
            task_list: "default".to_string(),
            input,
            execution_timeout: Duration::from_secs(600),
            decision_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = task_list.into();
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }
}

/// Errors from executor operations
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Registry error
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// History cannot be replayed
    #[error("replay error: {0}")]
    ReplayError(String),

    /// Too many events
    #[error("run {0} has too many events ({1} > {2})")]
    TooManyEvents(Uuid, usize, usize),
}

/// Result of recording an outcome and running the decision it triggered
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecisionResult {
    /// Set when the run is closed after this call
    pub closed: Option<CloseStatus>,

    /// Number of new events written
    pub events_written: usize,

    /// Number of tasks enqueued
    pub tasks_enqueued: usize,
}

/// What one timeout sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSweep {
    pub executions_timed_out: usize,
    pub activities_timed_out: usize,
}

/// Workflow executor
///
/// Every change to a run happens under that run's lock, so histories are
/// written by one caller at a time; the store's optimistic check on the next
/// event ID backs this up.
///
/// # Example
///
/// ```ignore
/// use flowgate_durable::prelude::*;
///
/// let store: Arc<dyn WorkflowEventStore> = Arc::new(InMemoryWorkflowEventStore::new());
/// let mut executor = WorkflowExecutor::new(store);
/// executor.register::<HelloWorldWorkflow>();
///
/// let run_id = executor
///     .start_workflow(StartWorkflowOptions::new("wf-1", "hello_world_workflow", json!("Ada")))
///     .await?;
/// ```
pub struct WorkflowExecutor {
    store: Arc<dyn WorkflowEventStore>,
    registry: WorkflowRegistry,
    config: ExecutorConfig,
    run_locks: RunLocks,
}

impl WorkflowExecutor {
    /// Create a new executor with the given store
    pub fn new(store: Arc<dyn WorkflowEventStore>) -> Self {
        Self::with_config(store, ExecutorConfig::default())
    }

    /// Create a new executor with custom config
    pub fn with_config(store: Arc<dyn WorkflowEventStore>, config: ExecutorConfig) -> Self {
        Self {
            store,
            registry: WorkflowRegistry::new(),
            config,
            run_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Register a workflow type
    pub fn register<W: Workflow>(&mut self) {
        self.registry.register::<W>();
        info!(workflow_type = W::TYPE, "registered workflow type");
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Get a reference to the store
    pub fn store(&self) -> &Arc<dyn WorkflowEventStore> {
        &self.store
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    /// Start a new run and run its first decision
    ///
    /// Returns the new run ID.
    #[instrument(skip(self, options), fields(workflow_id = %options.workflow_id, workflow_type = %options.workflow_type))]
    pub async fn start_workflow(&self, options: StartWorkflowOptions) -> Result<Uuid, ExecutorError> {
        if !self.registry.contains(&options.workflow_type) {
            return Err(RegistryError::UnknownWorkflowType(options.workflow_type).into());
        }

        let run_id = Uuid::now_v7();
        let initial_events = vec![
            WorkflowEvent::WorkflowExecutionStarted {
                workflow_type: options.workflow_type.clone(),
                task_list: options.task_list.clone(),
                input: options.input,
                execution_timeout: options.execution_timeout,
                decision_timeout: options.decision_timeout,
                identity: self.config.identity.clone(),
            },
            WorkflowEvent::DecisionTaskScheduled {
                task_list: options.task_list.clone(),
            },
        ];

        let _guard = self.lock_run(run_id).await;

        self.store
            .create_execution(
                NewExecution {
                    workflow_id: options.workflow_id.clone(),
                    run_id,
                    workflow_type: options.workflow_type,
                    task_list: options.task_list,
                    execution_timeout: options.execution_timeout,
                    start_time: Utc::now(),
                },
                initial_events,
            )
            .await?;

        info!(%run_id, "started workflow execution");

        self.decide(run_id).await?;
        Ok(run_id)
    }

    /// Record that a worker claimed an activity task
    ///
    /// Only the first attempt is recorded; retries live in the task table.
    #[instrument(skip(self, task), fields(task_id = %task.id, activity_id = %task.activity_id))]
    pub async fn on_activity_started(
        &self,
        task: &ClaimedTask,
        identity: &str,
    ) -> Result<(), ExecutorError> {
        if task.attempt > 1 {
            return Ok(());
        }

        let _guard = self.lock_run(task.run_id).await;

        let record = self.store.get_run(task.run_id).await?;
        if !record.is_open() {
            debug!(run_id = %task.run_id, "run closed before activity started");
            return Ok(());
        }

        self.store
            .append_events(
                task.run_id,
                record.history_length + 1,
                vec![WorkflowEvent::ActivityTaskStarted {
                    activity_id: task.activity_id.clone(),
                    attempt: task.attempt,
                    identity: identity.to_string(),
                }],
            )
            .await?;
        Ok(())
    }

    /// Record a successful activity result and let the workflow react to it
    #[instrument(skip(self, result))]
    pub async fn on_activity_completed(
        &self,
        task_id: Uuid,
        result: serde_json::Value,
    ) -> Result<DecisionResult, ExecutorError> {
        let task = self.store.get_task(task_id).await?;
        let _guard = self.lock_run(task.run_id).await;

        match self.store.complete_task(task_id).await {
            Ok(_) => {}
            Err(StoreError::TaskNotStarted { status, .. }) => {
                warn!(%task_id, %status, "dropping result of task that is no longer running");
                return Ok(DecisionResult::default());
            }
            Err(e) => return Err(e.into()),
        }

        self.record_and_decide(
            task.run_id,
            WorkflowEvent::ActivityTaskCompleted {
                activity_id: task.activity_id,
                result,
            },
        )
        .await
    }

    /// Record a failed attempt
    ///
    /// When the retry policy allows another attempt the task goes back in the
    /// queue and the history is untouched. Otherwise the failure (or timeout)
    /// is recorded and the workflow reacts to it.
    #[instrument(skip(self, error), fields(reason = %error))]
    pub async fn on_activity_failed(
        &self,
        task_id: Uuid,
        error: ActivityError,
        timeout: Option<TimeoutType>,
    ) -> Result<DecisionResult, ExecutorError> {
        let task = self.store.get_task(task_id).await?;
        let _guard = self.lock_run(task.run_id).await;

        match self.store.fail_task(task_id, &error, timeout).await {
            Ok(TaskFailureOutcome::WillRetry {
                next_attempt,
                delay,
            }) => {
                info!(
                    %task_id,
                    next_attempt,
                    delay_ms = delay.as_millis() as u64,
                    "activity attempt failed, retrying"
                );
                return Ok(DecisionResult::default());
            }
            Ok(TaskFailureOutcome::Exhausted) => {}
            Err(StoreError::TaskNotStarted { status, .. }) => {
                warn!(%task_id, %status, "dropping failure of task that is no longer running");
                return Ok(DecisionResult::default());
            }
            Err(e) => return Err(e.into()),
        }

        let event = match timeout {
            Some(timeout_type) => WorkflowEvent::ActivityTaskTimedOut {
                activity_id: task.activity_id,
                timeout_type,
            },
            None => WorkflowEvent::ActivityTaskFailed {
                activity_id: task.activity_id,
                reason: error.message,
                details: error.details,
            },
        };
        self.record_and_decide(task.run_id, event).await
    }

    /// Terminate a run from outside
    ///
    /// Targets the latest run of `workflow_id` when `run_id` is `None`.
    #[instrument(skip(self))]
    pub async fn terminate_workflow(
        &self,
        workflow_id: &str,
        run_id: Option<Uuid>,
        reason: &str,
    ) -> Result<Uuid, ExecutorError> {
        let record = self.store.get_execution(workflow_id, run_id).await?;
        let _guard = self.lock_run(record.run_id).await;

        let record = self.store.get_run(record.run_id).await?;
        if !record.is_open() {
            return Err(StoreError::ExecutionClosed(record.run_id).into());
        }

        self.store
            .append_events(
                record.run_id,
                record.history_length + 1,
                vec![WorkflowEvent::WorkflowExecutionTerminated {
                    reason: reason.to_string(),
                    identity: self.config.identity.clone(),
                }],
            )
            .await?;
        self.close(record.run_id, CloseStatus::Terminated).await?;

        info!(run_id = %record.run_id, "terminated workflow execution");
        Ok(record.run_id)
    }

    /// Time out runs past their execution timeout and tasks nobody claimed in time
    #[instrument(skip(self))]
    pub async fn enforce_timeouts(&self, now: DateTime<Utc>) -> Result<TimeoutSweep, ExecutorError> {
        let mut sweep = TimeoutSweep::default();

        let open = self.store.list_executions(&ExecutionFilter::open()).await?;
        for record in open.into_iter().filter(|r| r.deadline() <= now) {
            match self.time_out_execution(record.run_id).await {
                Ok(true) => sweep.executions_timed_out += 1,
                Ok(false) => {}
                Err(e) => warn!(run_id = %record.run_id, "failed to time out execution: {}", e),
            }
        }

        for task in self.store.expired_scheduled_tasks(now).await? {
            let result = self
                .on_activity_failed(
                    task.id,
                    ActivityError::timed_out(TimeoutType::ScheduleToStart),
                    Some(TimeoutType::ScheduleToStart),
                )
                .await;
            match result {
                Ok(_) => sweep.activities_timed_out += 1,
                Err(e) => warn!(task_id = %task.id, "failed to time out activity: {}", e),
            }
        }

        if sweep != TimeoutSweep::default() {
            info!(
                executions = sweep.executions_timed_out,
                activities = sweep.activities_timed_out,
                "timeout sweep"
            );
        }
        Ok(sweep)
    }

    async fn time_out_execution(&self, run_id: Uuid) -> Result<bool, ExecutorError> {
        let _guard = self.lock_run(run_id).await;

        let record = self.store.get_run(run_id).await?;
        if !record.is_open() {
            return Ok(false);
        }

        self.store
            .append_events(
                run_id,
                record.history_length + 1,
                vec![WorkflowEvent::WorkflowExecutionTimedOut {
                    timeout_type: TimeoutType::StartToClose,
                }],
            )
            .await?;
        self.close(run_id, CloseStatus::TimedOut).await?;
        Ok(true)
    }

    /// Append an activity outcome plus a decision request, then decide
    ///
    /// Caller holds the run lock.
    async fn record_and_decide(
        &self,
        run_id: Uuid,
        event: WorkflowEvent,
    ) -> Result<DecisionResult, ExecutorError> {
        let record = self.store.get_run(run_id).await?;
        if !record.is_open() {
            debug!(%run_id, event = event.name(), "run already closed, ignoring");
            return Ok(DecisionResult {
                closed: record.close_status,
                ..Default::default()
            });
        }

        self.store
            .append_events(
                run_id,
                record.history_length + 1,
                vec![
                    event,
                    WorkflowEvent::DecisionTaskScheduled {
                        task_list: record.task_list,
                    },
                ],
            )
            .await?;

        let mut result = self.decide(run_id).await?;
        result.events_written += 2;
        Ok(result)
    }

    /// Run one decision: replay the history and record the new actions
    ///
    /// Caller holds the run lock.
    async fn decide(&self, run_id: Uuid) -> Result<DecisionResult, ExecutorError> {
        let record = self.store.get_run(run_id).await?;
        if !record.is_open() {
            return Ok(DecisionResult {
                closed: record.close_status,
                ..Default::default()
            });
        }

        let history = self.store.load_events(run_id).await?;
        if history.len() > self.config.max_events_per_workflow {
            return Err(ExecutorError::TooManyEvents(
                run_id,
                history.len(),
                self.config.max_events_per_workflow,
            ));
        }

        let input = match history.first().map(|e| &e.event) {
            Some(WorkflowEvent::WorkflowExecutionStarted { input, .. }) => input.clone(),
            _ => {
                return Err(ExecutorError::ReplayError(
                    "first event must be WorkflowExecutionStarted".to_string(),
                ))
            }
        };

        let next_id = self
            .store
            .append_events(
                run_id,
                history.len() as i64 + 1,
                vec![WorkflowEvent::DecisionTaskStarted {
                    identity: self.config.identity.clone(),
                }],
            )
            .await?;

        let mut workflow = self.registry.create(&record.workflow_type, input)?;
        let actions = replay(workflow.as_mut(), &history);
        debug!(%run_id, replayed = history.len(), new_actions = actions.len(), "replayed history");

        let mut events = vec![WorkflowEvent::DecisionTaskCompleted];
        let mut tasks = vec![];
        let mut closed = None;

        for action in actions {
            match action {
                WorkflowAction::ScheduleActivity {
                    activity_id,
                    activity_type,
                    input,
                    options,
                } => {
                    events.push(WorkflowEvent::ActivityTaskScheduled {
                        activity_id: activity_id.clone(),
                        activity_type: activity_type.clone(),
                        task_list: record.task_list.clone(),
                        input: input.clone(),
                        options: options.clone(),
                    });
                    tasks.push(TaskDefinition {
                        workflow_id: record.workflow_id.clone(),
                        run_id,
                        activity_id,
                        activity_type,
                        task_list: record.task_list.clone(),
                        input,
                        options,
                    });
                }
                WorkflowAction::CompleteWorkflow { result } => {
                    events.push(WorkflowEvent::WorkflowExecutionCompleted { result });
                    closed = Some(CloseStatus::Completed);
                }
                WorkflowAction::FailWorkflow { error } => {
                    events.push(WorkflowEvent::WorkflowExecutionFailed {
                        reason: error.reason,
                        details: error.details,
                    });
                    closed = Some(CloseStatus::Failed);
                }
            }
            if closed.is_some() {
                break;
            }
        }

        let events_written = events.len() + 1;
        self.store.append_events(run_id, next_id, events).await?;

        let tasks_enqueued = if closed.is_none() { tasks.len() } else { 0 };
        if closed.is_none() {
            for task in tasks {
                let task_id = self.store.enqueue_task(task).await?;
                debug!(%run_id, %task_id, "enqueued activity task");
            }
        }

        if let Some(status) = closed {
            self.close(run_id, status).await?;
        }

        Ok(DecisionResult {
            closed,
            events_written,
            tasks_enqueued,
        })
    }

    async fn close(&self, run_id: Uuid, status: CloseStatus) -> Result<(), ExecutorError> {
        self.store.close_execution(run_id, status, Utc::now()).await?;
        let cancelled = self.store.cancel_tasks(run_id).await?;
        info!(%run_id, %status, cancelled_tasks = cancelled, "closed workflow execution");
        Ok(())
    }

    /// Serialize history writes for one run
    async fn lock_run(&self, run_id: Uuid) -> RunGuard<'_> {
        let lock = self.run_locks.lock().entry(run_id).or_default().clone();
        RunGuard {
            locks: &self.run_locks,
            run_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn tracked_run_locks(&self) -> usize {
        self.run_locks.lock().len()
    }
}

type RunLocks = parking_lot::Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>;

/// Held while a run's history is written
///
/// Dropping the last guard of a run removes its lock from the map, so only runs
/// with writers in flight are tracked.
struct RunGuard<'a> {
    locks: &'a RunLocks,
    run_id: Uuid,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        // Waiters clone the Arc under this mutex, so a count of one means the
        // map holds the only reference.
        if locks
            .get(&self.run_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.run_id);
        }
    }
}

/// Replay `history` through `workflow`
///
/// Returns the actions produced by events recorded after the last completed
/// decision; actions for earlier events are already in the history.
fn replay(workflow: &mut dyn AnyWorkflow, history: &[HistoryEvent]) -> Vec<WorkflowAction> {
    let decided_through = history
        .iter()
        .rposition(|e| matches!(e.event, WorkflowEvent::DecisionTaskCompleted));

    let mut new_actions = vec![];
    for (index, record) in history.iter().enumerate() {
        let Some(actions) = workflow.apply(&record.event) else {
            continue;
        };
        if decided_through.map_or(true, |d| index > d) {
            new_actions.extend(actions);
        }
    }
    new_actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryWorkflowEventStore, TaskStatus};
    use crate::reliability::RetryPolicy;
    use crate::workflow::{ActivityOptions, WorkflowError};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct EchoInput {
        text: String,
        max_attempts: u32,
    }

    struct Echo {
        input: EchoInput,
        reply: Option<String>,
        failure: Option<WorkflowError>,
    }

    impl Workflow for Echo {
        const TYPE: &'static str = "echo";
        type Input = EchoInput;
        type Output = String;

        fn new(input: EchoInput) -> Self {
            Self {
                input,
                reply: None,
                failure: None,
            }
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            let options = ActivityOptions::default()
                .with_retry(RetryPolicy::fixed(Duration::ZERO, self.input.max_attempts));
            vec![
                WorkflowAction::schedule_activity("0", "echo_activity", json!(self.input.text))
                    .with_options(options),
            ]
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
            let error = WorkflowError::from(error);
            self.failure = Some(error.clone());
            vec![WorkflowAction::fail(error)]
        }

        fn is_completed(&self) -> bool {
            self.reply.is_some() || self.failure.is_some()
        }

        fn result(&self) -> Option<String> {
            self.reply.clone()
        }

        fn error(&self) -> Option<WorkflowError> {
            self.failure.clone()
        }
    }

    fn executor() -> WorkflowExecutor {
        let store: Arc<dyn WorkflowEventStore> = Arc::new(InMemoryWorkflowEventStore::new());
        let mut executor =
            WorkflowExecutor::with_config(store, ExecutorConfig::default().with_identity("test"));
        executor.register::<Echo>();
        executor
    }

    fn options(workflow_id: &str, max_attempts: u32) -> StartWorkflowOptions {
        StartWorkflowOptions::new(
            workflow_id,
            Echo::TYPE,
            json!({"text": "Ada", "max_attempts": max_attempts}),
        )
        .with_task_list("test-worker")
    }

    async fn names(executor: &WorkflowExecutor, run_id: Uuid) -> Vec<&'static str> {
        executor
            .store()
            .load_events(run_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.event.name())
            .collect()
    }

    async fn claim(executor: &WorkflowExecutor) -> ClaimedTask {
        let mut tasks = executor
            .store()
            .claim_tasks("test", "test-worker", &["echo_activity".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1, "expected one claimable task");
        tasks.remove(0)
    }

    #[tokio::test]
    async fn test_start_schedules_activity() {
        let executor = executor();
        let run_id = executor.start_workflow(options("wf-1", 1)).await.unwrap();

        assert_eq!(
            names(&executor, run_id).await,
            vec![
                "WorkflowExecutionStarted",
                "DecisionTaskScheduled",
                "DecisionTaskStarted",
                "DecisionTaskCompleted",
                "ActivityTaskScheduled",
            ]
        );

        let record = executor.store().get_execution("wf-1", None).await.unwrap();
        assert_eq!(record.run_id, run_id);
        assert_eq!(record.workflow_type, "echo");
        assert!(record.is_open());

        let pending = executor.store().pending_activities(run_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].activity_type, "echo_activity");
        assert_eq!(pending[0].status, TaskStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_unknown_workflow_type_rejected() {
        let executor = executor();
        let result = executor
            .start_workflow(StartWorkflowOptions::new("wf-1", "missing", json!(null)))
            .await;

        assert!(matches!(
            result,
            Err(ExecutorError::Registry(RegistryError::UnknownWorkflowType(_)))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_start_rejected() {
        let executor = executor();
        executor.start_workflow(options("wf-1", 1)).await.unwrap();

        let result = executor.start_workflow(options("wf-1", 1)).await;
        assert!(matches!(
            result,
            Err(ExecutorError::Store(StoreError::AlreadyStarted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_activity_completion_completes_run() {
        let executor = executor();
        let run_id = executor.start_workflow(options("wf-1", 1)).await.unwrap();

        let task = claim(&executor).await;
        executor.on_activity_started(&task, "worker-1").await.unwrap();
        let result = executor
            .on_activity_completed(task.id, json!("Hello Ada!"))
            .await
            .unwrap();

        assert_eq!(result.closed, Some(CloseStatus::Completed));
        assert_eq!(
            names(&executor, run_id).await[5..],
            [
                "ActivityTaskStarted",
                "ActivityTaskCompleted",
                "DecisionTaskScheduled",
                "DecisionTaskStarted",
                "DecisionTaskCompleted",
                "WorkflowExecutionCompleted",
            ]
        );

        let events = executor.store().load_events(run_id).await.unwrap();
        assert!(matches!(
            &events.last().unwrap().event,
            WorkflowEvent::WorkflowExecutionCompleted { result } if result == &json!("Hello Ada!")
        ));

        let record = executor.store().get_run(run_id).await.unwrap();
        assert_eq!(record.close_status, Some(CloseStatus::Completed));
        assert!(record.close_time.is_some());
    }

    #[tokio::test]
    async fn test_activity_failure_fails_run_with_same_reason() {
        let executor = executor();
        let run_id = executor.start_workflow(options("wf-1", 1)).await.unwrap();

        let task = claim(&executor).await;
        let result = executor
            .on_activity_failed(task.id, ActivityError::retryable("boom"), None)
            .await
            .unwrap();
        assert_eq!(result.closed, Some(CloseStatus::Failed));

        let events = executor.store().load_events(run_id).await.unwrap();
        let failed = events
            .iter()
            .find_map(|e| match &e.event {
                WorkflowEvent::ActivityTaskFailed { reason, .. } => Some((e.event_id, reason)),
                _ => None,
            })
            .unwrap();
        let workflow_failed = events
            .iter()
            .find_map(|e| match &e.event {
                WorkflowEvent::WorkflowExecutionFailed { reason, .. } => Some((e.event_id, reason)),
                _ => None,
            })
            .unwrap();

        assert_eq!(failed.1, "boom");
        assert_eq!(workflow_failed.1, "boom");
        assert!(failed.0 < workflow_failed.0);
    }

    #[tokio::test]
    async fn test_retry_leaves_history_untouched() {
        let executor = executor();
        let run_id = executor.start_workflow(options("wf-1", 2)).await.unwrap();

        let task = claim(&executor).await;
        executor.on_activity_started(&task, "worker-1").await.unwrap();
        let before = names(&executor, run_id).await.len();

        let result = executor
            .on_activity_failed(task.id, ActivityError::retryable("flaky"), None)
            .await
            .unwrap();
        assert_eq!(result, DecisionResult::default());
        assert_eq!(names(&executor, run_id).await.len(), before);

        let pending = executor.store().pending_activities(run_id).await.unwrap();
        assert_eq!(pending[0].attempt, 2);

        let retry = claim(&executor).await;
        assert_eq!(retry.attempt, 2);
        executor.on_activity_started(&retry, "worker-1").await.unwrap();
        assert_eq!(names(&executor, run_id).await.len(), before);

        let result = executor
            .on_activity_completed(retry.id, json!("Hello Ada!"))
            .await
            .unwrap();
        assert_eq!(result.closed, Some(CloseStatus::Completed));
    }

    #[tokio::test]
    async fn test_late_result_after_terminate_is_dropped() {
        let executor = executor();
        let run_id = executor.start_workflow(options("wf-1", 1)).await.unwrap();
        let task = claim(&executor).await;

        executor
            .terminate_workflow("wf-1", None, "operator request")
            .await
            .unwrap();

        let result = executor
            .on_activity_completed(task.id, json!("Hello Ada!"))
            .await
            .unwrap();
        assert_eq!(result, DecisionResult::default());

        let names = names(&executor, run_id).await;
        assert_eq!(names.last(), Some(&"WorkflowExecutionTerminated"));
        assert!(!names.contains(&"ActivityTaskCompleted"));

        let again = executor.terminate_workflow("wf-1", Some(run_id), "again").await;
        assert!(matches!(
            again,
            Err(ExecutorError::Store(StoreError::ExecutionClosed(_)))
        ));
        assert_eq!(executor.tracked_run_locks(), 0);
    }

    #[tokio::test]
    async fn test_run_locks_released_after_each_write() {
        let executor = Arc::new(executor());
        executor.start_workflow(options("wf-1", 1)).await.unwrap();
        executor.start_workflow(options("wf-2", 1)).await.unwrap();
        assert_eq!(executor.tracked_run_locks(), 0);

        let task = claim(&executor).await;
        let mut writers = tokio::task::JoinSet::new();
        {
            let executor = executor.clone();
            let task = task.clone();
            writers.spawn(async move { executor.on_activity_started(&task, "test").await });
        }
        {
            let executor = executor.clone();
            writers.spawn(async move {
                executor
                    .terminate_workflow("wf-2", None, "operator request")
                    .await
                    .map(|_| ())
            });
        }
        while let Some(joined) = writers.join_next().await {
            joined.unwrap().unwrap();
        }
        assert_eq!(executor.tracked_run_locks(), 0);

        executor
            .on_activity_completed(task.id, json!("Hello Ada!"))
            .await
            .unwrap();

        assert!(!executor.store().get_run(task.run_id).await.unwrap().is_open());
        assert_eq!(executor.tracked_run_locks(), 0);
    }

    #[tokio::test]
    async fn test_execution_timeout_sweep() {
        let executor = executor();
        let run_id = executor
            .start_workflow(options("wf-1", 1).with_execution_timeout(Duration::from_secs(60)))
            .await
            .unwrap();

        let sweep = executor.enforce_timeouts(Utc::now()).await.unwrap();
        assert_eq!(sweep, TimeoutSweep::default());

        let later = Utc::now() + chrono::Duration::seconds(61);
        let sweep = executor.enforce_timeouts(later).await.unwrap();
        assert_eq!(sweep.executions_timed_out, 1);

        let record = executor.store().get_run(run_id).await.unwrap();
        assert_eq!(record.close_status, Some(CloseStatus::TimedOut));
        assert_eq!(
            names(&executor, run_id).await.last(),
            Some(&"WorkflowExecutionTimedOut")
        );
        assert!(executor
            .store()
            .pending_activities(run_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_schedule_to_start_timeout_fails_run() {
        let executor = executor();
        let run_id = executor.start_workflow(options("wf-1", 3)).await.unwrap();

        // Default schedule-to-start is 60s; the execution timeout is 10 minutes
        let later = Utc::now() + chrono::Duration::seconds(61);
        let sweep = executor.enforce_timeouts(later).await.unwrap();
        assert_eq!(sweep.activities_timed_out, 1);
        assert_eq!(sweep.executions_timed_out, 0);

        let events = executor.store().load_events(run_id).await.unwrap();
        assert!(events.iter().any(|e| matches!(
            e.event,
            WorkflowEvent::ActivityTaskTimedOut {
                timeout_type: TimeoutType::ScheduleToStart,
                ..
            }
        )));
        assert!(matches!(
            &events.last().unwrap().event,
            WorkflowEvent::WorkflowExecutionFailed { reason, .. }
                if reason == "activity timed out: SCHEDULE_TO_START"
        ));
    }

    #[test]
    fn test_replay_only_returns_new_actions() {
        let mut registry = WorkflowRegistry::new();
        registry.register::<Echo>();
        let input = json!({"text": "Ada", "max_attempts": 1});
        let at = Utc::now();
        let event = |event_id, event| HistoryEvent {
            event_id,
            timestamp: at,
            event,
        };

        let mut history = vec![
            event(
                1,
                WorkflowEvent::WorkflowExecutionStarted {
                    workflow_type: "echo".to_string(),
                    task_list: "test-worker".to_string(),
                    input: input.clone(),
                    execution_timeout: Duration::from_secs(600),
                    decision_timeout: Duration::from_secs(60),
                    identity: "test".to_string(),
                },
            ),
            event(
                2,
                WorkflowEvent::DecisionTaskScheduled {
                    task_list: "test-worker".to_string(),
                },
            ),
        ];

        let mut workflow = registry.create("echo", input.clone()).unwrap();
        let first = replay(workflow.as_mut(), &history);
        assert!(matches!(first[..], [WorkflowAction::ScheduleActivity { .. }]));

        history.push(event(3, WorkflowEvent::DecisionTaskCompleted));
        history.push(event(
            4,
            WorkflowEvent::ActivityTaskCompleted {
                activity_id: "0".to_string(),
                result: json!("Hello Ada!"),
            },
        ));

        let mut workflow = registry.create("echo", input).unwrap();
        let second = replay(workflow.as_mut(), &history);
        assert_eq!(second, vec![WorkflowAction::complete(json!("Hello Ada!"))]);
    }
}
