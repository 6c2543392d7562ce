//! WorkflowEventStore trait definition

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityError;
use crate::workflow::{ActivityOptions, CloseStatus, HistoryEvent, TimeoutType, WorkflowEvent};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No run exists for this workflow ID (or workflow ID and run ID pair)
    #[error("workflow execution not found: {workflow_id}")]
    ExecutionNotFound { workflow_id: String },

    /// Run ID is unknown
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    /// The workflow ID already has an open run
    #[error("workflow execution already started: {workflow_id} (run {run_id})")]
    AlreadyStarted { workflow_id: String, run_id: Uuid },

    /// Concurrency conflict (optimistic locking failed)
    #[error("concurrency conflict: expected next event id {expected}, got {actual}")]
    ConcurrencyConflict { expected: i64, actual: i64 },

    /// The run is closed; its history no longer accepts events
    #[error("run {0} is already closed")]
    ExecutionClosed(Uuid),

    /// Task not found
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// Task exists but is not in a state that accepts this transition
    #[error("task {task_id} is {status}, not started")]
    TaskNotStarted { task_id: Uuid, status: TaskStatus },
}

/// Execution row as tracked by the store
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub workflow_id: String,
    pub run_id: Uuid,
    pub workflow_type: String,
    pub task_list: String,
    pub start_time: DateTime<Utc>,
    pub execution_timeout: Duration,
    pub close_time: Option<DateTime<Utc>>,
    pub close_status: Option<CloseStatus>,
    pub history_length: i64,
}

impl ExecutionRecord {
    pub fn is_open(&self) -> bool {
        self.close_status.is_none()
    }

    /// When the run exceeds its execution timeout
    pub fn deadline(&self) -> DateTime<Utc> {
        let timeout = chrono::Duration::from_std(self.execution_timeout)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        self.start_time
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A run to be created together with its first history events
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub workflow_id: String,
    pub run_id: Uuid,
    pub workflow_type: String,
    pub task_list: String,
    pub execution_timeout: Duration,
    pub start_time: DateTime<Utc>,
}

/// Which side of the open/closed split to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPartition {
    Open,
    Closed,
}

/// Filter for listing executions
#[derive(Debug, Clone)]
pub struct ExecutionFilter {
    pub partition: ExecutionPartition,

    /// Inclusive lower bound on start time
    pub earliest_start: Option<DateTime<Utc>>,

    /// Inclusive upper bound on start time
    pub latest_start: Option<DateTime<Utc>>,

    pub limit: usize,
}

impl ExecutionFilter {
    pub fn open() -> Self {
        Self {
            partition: ExecutionPartition::Open,
            earliest_start: None,
            latest_start: None,
            limit: usize::MAX,
        }
    }

    pub fn closed() -> Self {
        Self {
            partition: ExecutionPartition::Closed,
            ..Self::open()
        }
    }

    pub fn started_between(mut self, earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Self {
        self.earliest_start = Some(earliest);
        self.latest_start = Some(latest);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        let partition_ok = match self.partition {
            ExecutionPartition::Open => record.is_open(),
            ExecutionPartition::Closed => !record.is_open(),
        };
        partition_ok
            && self.earliest_start.map_or(true, |t| record.start_time >= t)
            && self.latest_start.map_or(true, |t| record.start_time <= t)
    }
}

/// Task status in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for a worker (initial attempt or a retry)
    Scheduled,
    /// Claimed by a worker
    Started,
    Completed,
    Failed,
    TimedOut,
    /// The owning run closed before the task finished
    Canceled,
}

impl TaskStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Started)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scheduled => "SCHEDULED",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// Definition of a task to be enqueued
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub workflow_id: String,
    pub run_id: Uuid,
    pub activity_id: String,
    pub activity_type: String,
    pub task_list: String,
    pub input: serde_json::Value,
    pub options: ActivityOptions,
}

/// A task that has been claimed by a worker
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub workflow_id: String,
    pub run_id: Uuid,
    pub activity_id: String,
    pub activity_type: String,
    pub input: serde_json::Value,
    pub options: ActivityOptions,
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Live bookkeeping for one activity task
///
/// This is the attempt table: retries and heartbeats are tracked here and
/// never appear in the history.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTaskInfo {
    pub id: Uuid,
    pub workflow_id: String,
    pub run_id: Uuid,
    pub activity_id: String,
    pub activity_type: String,
    pub status: TaskStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub scheduled_time: DateTime<Utc>,
    pub last_started_time: Option<DateTime<Utc>>,
    pub last_heartbeat_time: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
}

/// Outcome of failing a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFailureOutcome {
    /// Task was put back in the queue for another attempt
    WillRetry { next_attempt: u32, delay: Duration },

    /// No attempts left; the failure belongs in the history now
    Exhausted,
}

/// Storage for workflow histories and the activity task queue
///
/// Implementations must keep every history append-only with contiguous event
/// IDs starting at 1 and non-decreasing timestamps.
#[async_trait]
pub trait WorkflowEventStore: Send + Sync + 'static {
    // =========================================================================
    // Executions and histories
    // =========================================================================

    /// Create a run and write its first events
    ///
    /// Fails with [`StoreError::AlreadyStarted`] if the workflow ID has an open run.
    async fn create_execution(
        &self,
        execution: NewExecution,
        initial_events: Vec<WorkflowEvent>,
    ) -> Result<(), StoreError>;

    /// Get a run, or the latest run of the workflow ID when `run_id` is `None`
    async fn get_execution(
        &self,
        workflow_id: &str,
        run_id: Option<Uuid>,
    ) -> Result<ExecutionRecord, StoreError>;

    /// Get a run by its run ID alone
    async fn get_run(&self, run_id: Uuid) -> Result<ExecutionRecord, StoreError>;

    /// Append events, failing unless the next event ID is `expected_next_id`
    ///
    /// Returns the next event ID after the append.
    async fn append_events(
        &self,
        run_id: Uuid,
        expected_next_id: i64,
        events: Vec<WorkflowEvent>,
    ) -> Result<i64, StoreError>;

    /// Load a run's whole history
    async fn load_events(&self, run_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError>;

    /// Read up to `max` events starting at `from_event_id`
    async fn read_history(
        &self,
        run_id: Uuid,
        from_event_id: i64,
        max: usize,
    ) -> Result<Vec<HistoryEvent>, StoreError>;

    /// Mark a run closed; the history must already contain its terminal event
    async fn close_execution(
        &self,
        run_id: Uuid,
        status: CloseStatus,
        closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// List runs, most recently started first
    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;

    // =========================================================================
    // Activity tasks
    // =========================================================================

    /// Add a task for its first attempt; returns the task ID
    async fn enqueue_task(&self, task: TaskDefinition) -> Result<Uuid, StoreError>;

    /// Claim up to `max` scheduled tasks of the given types on a task list
    async fn claim_tasks(
        &self,
        worker_id: &str,
        task_list: &str,
        activity_types: &[String],
        max: usize,
    ) -> Result<Vec<ClaimedTask>, StoreError>;

    /// Record a heartbeat for a started task
    async fn heartbeat_task(&self, task_id: Uuid) -> Result<(), StoreError>;

    async fn get_task(&self, task_id: Uuid) -> Result<ActivityTaskInfo, StoreError>;

    /// Mark a started task completed
    async fn complete_task(&self, task_id: Uuid) -> Result<ActivityTaskInfo, StoreError>;

    /// Fail an attempt; the retry policy decides whether it goes back in the queue
    ///
    /// `timeout` is set when the attempt failed by exceeding a timeout.
    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &ActivityError,
        timeout: Option<TimeoutType>,
    ) -> Result<TaskFailureOutcome, StoreError>;

    /// Scheduled tasks that have waited longer than their schedule-to-start timeout
    async fn expired_scheduled_tasks(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActivityTaskInfo>, StoreError>;

    /// Tasks of a run that are scheduled or started
    async fn pending_activities(&self, run_id: Uuid) -> Result<Vec<ActivityTaskInfo>, StoreError>;

    /// Cancel every pending task of a run; returns how many were cancelled
    async fn cancel_tasks(&self, run_id: Uuid) -> Result<usize, StoreError>;
}
