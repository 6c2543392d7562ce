//! In-memory implementation of WorkflowEventStore

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;
use crate::activity::ActivityError;
use crate::workflow::{CloseStatus, HistoryEvent, TimeoutType, WorkflowEvent};

/// One run and its history
struct ExecutionState {
    record: ExecutionRecord,
    events: Vec<HistoryEvent>,
}

impl ExecutionState {
    fn next_event_id(&self) -> i64 {
        self.events.len() as i64 + 1
    }

    /// Stamp and append events, keeping timestamps non-decreasing
    fn push(&mut self, events: Vec<WorkflowEvent>, at: DateTime<Utc>) {
        let at = match self.events.last() {
            Some(last) if last.timestamp > at => last.timestamp,
            _ => at,
        };
        for event in events {
            let event_id = self.next_event_id();
            self.events.push(HistoryEvent {
                event_id,
                timestamp: at,
                event,
            });
        }
        self.record.history_length = self.events.len() as i64;
    }
}

/// Internal task state
struct TaskState {
    definition: TaskDefinition,
    status: TaskStatus,
    attempt: u32,
    scheduled_at: DateTime<Utc>,
    available_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    claimed_by: Option<String>,
    last_error: Option<String>,
}

impl TaskState {
    fn info(&self, id: Uuid) -> ActivityTaskInfo {
        ActivityTaskInfo {
            id,
            workflow_id: self.definition.workflow_id.clone(),
            run_id: self.definition.run_id,
            activity_id: self.definition.activity_id.clone(),
            activity_type: self.definition.activity_type.clone(),
            status: self.status,
            attempt: self.attempt,
            max_attempts: self.definition.options.retry_policy.max_attempts,
            scheduled_time: self.scheduled_at,
            last_started_time: self.started_at,
            last_heartbeat_time: self.last_heartbeat_at,
            last_failure: self.last_error.clone(),
        }
    }
}

/// In-memory implementation of WorkflowEventStore
///
/// Everything lives behind `parking_lot` locks; nothing survives a restart.
///
/// # Example
///
/// ```
/// use flowgate_durable::InMemoryWorkflowEventStore;
///
/// let store = InMemoryWorkflowEventStore::new();
/// assert_eq!(store.execution_count(), 0);
/// ```
pub struct InMemoryWorkflowEventStore {
    /// Locked before `runs_by_workflow` when both are held
    executions: RwLock<HashMap<Uuid, ExecutionState>>,
    /// Run IDs per workflow ID, in start order
    runs_by_workflow: RwLock<HashMap<String, Vec<Uuid>>>,
    tasks: RwLock<HashMap<Uuid, TaskState>>,
}

impl InMemoryWorkflowEventStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
            runs_by_workflow: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of runs
    pub fn execution_count(&self) -> usize {
        self.executions.read().len()
    }

    /// Get the number of tasks waiting for a worker
    pub fn scheduled_task_count(&self) -> usize {
        self.tasks
            .read()
            .values()
            .filter(|t| t.status == TaskStatus::Scheduled)
            .count()
    }
}

impl Default for InMemoryWorkflowEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowEventStore for InMemoryWorkflowEventStore {
    async fn create_execution(
        &self,
        execution: NewExecution,
        initial_events: Vec<WorkflowEvent>,
    ) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let mut runs_by_workflow = self.runs_by_workflow.write();

        let runs = runs_by_workflow
            .entry(execution.workflow_id.clone())
            .or_default();
        if let Some(open) = runs
            .iter()
            .find(|run_id| executions.get(run_id).is_some_and(|e| e.record.is_open()))
        {
            return Err(StoreError::AlreadyStarted {
                workflow_id: execution.workflow_id,
                run_id: *open,
            });
        }

        let mut state = ExecutionState {
            record: ExecutionRecord {
                workflow_id: execution.workflow_id,
                run_id: execution.run_id,
                workflow_type: execution.workflow_type,
                task_list: execution.task_list,
                start_time: execution.start_time,
                execution_timeout: execution.execution_timeout,
                close_time: None,
                close_status: None,
                history_length: 0,
            },
            events: vec![],
        };
        state.push(initial_events, execution.start_time);

        runs.push(execution.run_id);
        executions.insert(execution.run_id, state);
        Ok(())
    }

    async fn get_execution(
        &self,
        workflow_id: &str,
        run_id: Option<Uuid>,
    ) -> Result<ExecutionRecord, StoreError> {
        let not_found = || StoreError::ExecutionNotFound {
            workflow_id: workflow_id.to_string(),
        };

        // Released before `executions` is locked; `create_execution` takes the
        // two locks in the opposite order.
        let run_id = {
            let runs_by_workflow = self.runs_by_workflow.read();
            let runs = runs_by_workflow.get(workflow_id).ok_or_else(not_found)?;
            match run_id {
                Some(run_id) if runs.contains(&run_id) => run_id,
                Some(_) => return Err(not_found()),
                None => *runs.last().ok_or_else(not_found)?,
            }
        };

        self.executions
            .read()
            .get(&run_id)
            .map(|e| e.record.clone())
            .ok_or_else(not_found)
    }

    async fn get_run(&self, run_id: Uuid) -> Result<ExecutionRecord, StoreError> {
        self.executions
            .read()
            .get(&run_id)
            .map(|e| e.record.clone())
            .ok_or(StoreError::RunNotFound(run_id))
    }

    async fn append_events(
        &self,
        run_id: Uuid,
        expected_next_id: i64,
        events: Vec<WorkflowEvent>,
    ) -> Result<i64, StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;

        if !execution.record.is_open() {
            return Err(StoreError::ExecutionClosed(run_id));
        }

        let actual = execution.next_event_id();
        if actual != expected_next_id {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_next_id,
                actual,
            });
        }

        execution.push(events, Utc::now());
        Ok(execution.next_event_id())
    }

    async fn load_events(&self, run_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError> {
        self.executions
            .read()
            .get(&run_id)
            .map(|e| e.events.clone())
            .ok_or(StoreError::RunNotFound(run_id))
    }

    async fn read_history(
        &self,
        run_id: Uuid,
        from_event_id: i64,
        max: usize,
    ) -> Result<Vec<HistoryEvent>, StoreError> {
        let executions = self.executions.read();
        let execution = executions
            .get(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;

        let skip = from_event_id.saturating_sub(1).max(0) as usize;
        Ok(execution
            .events
            .iter()
            .skip(skip)
            .take(max)
            .cloned()
            .collect())
    }

    async fn close_execution(
        &self,
        run_id: Uuid,
        status: CloseStatus,
        closed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;

        if !execution.record.is_open() {
            return Err(StoreError::ExecutionClosed(run_id));
        }

        let closed_at = match execution.events.last() {
            Some(last) if last.timestamp > closed_at => last.timestamp,
            _ => closed_at,
        };
        execution.record.close_status = Some(status);
        execution.record.close_time = Some(closed_at);
        Ok(())
    }

    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let executions = self.executions.read();
        let mut records: Vec<ExecutionRecord> = executions
            .values()
            .filter(|e| filter.matches(&e.record))
            .map(|e| e.record.clone())
            .collect();

        records.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        records.truncate(filter.limit);
        Ok(records)
    }

    async fn enqueue_task(&self, task: TaskDefinition) -> Result<Uuid, StoreError> {
        let task_id = Uuid::now_v7();
        let now = Utc::now();
        self.tasks.write().insert(
            task_id,
            TaskState {
                definition: task,
                status: TaskStatus::Scheduled,
                attempt: 1,
                scheduled_at: now,
                available_at: now,
                started_at: None,
                last_heartbeat_at: None,
                claimed_by: None,
                last_error: None,
            },
        );
        Ok(task_id)
    }

    async fn claim_tasks(
        &self,
        worker_id: &str,
        task_list: &str,
        activity_types: &[String],
        max: usize,
    ) -> Result<Vec<ClaimedTask>, StoreError> {
        let now = Utc::now();
        let mut tasks = self.tasks.write();

        let mut ready: Vec<Uuid> = tasks
            .iter()
            .filter(|(_, t)| {
                t.status == TaskStatus::Scheduled
                    && t.available_at <= now
                    && t.definition.task_list == task_list
                    && activity_types.contains(&t.definition.activity_type)
            })
            .map(|(id, _)| *id)
            .collect();
        // v7 IDs sort by creation time
        ready.sort();
        ready.truncate(max);

        let mut claimed = Vec::with_capacity(ready.len());
        for task_id in ready {
            let Some(task) = tasks.get_mut(&task_id) else {
                continue;
            };
            task.status = TaskStatus::Started;
            task.started_at = Some(now);
            task.last_heartbeat_at = None;
            task.claimed_by = Some(worker_id.to_string());

            claimed.push(ClaimedTask {
                id: task_id,
                workflow_id: task.definition.workflow_id.clone(),
                run_id: task.definition.run_id,
                activity_id: task.definition.activity_id.clone(),
                activity_type: task.definition.activity_type.clone(),
                input: task.definition.input.clone(),
                options: task.definition.options.clone(),
                attempt: task.attempt,
                max_attempts: task.definition.options.retry_policy.max_attempts,
            });
        }

        Ok(claimed)
    }

    async fn heartbeat_task(&self, task_id: Uuid) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::Started {
            return Err(StoreError::TaskNotStarted {
                task_id,
                status: task.status,
            });
        }
        task.last_heartbeat_at = Some(Utc::now());
        Ok(())
    }

    async fn get_task(&self, task_id: Uuid) -> Result<ActivityTaskInfo, StoreError> {
        self.tasks
            .read()
            .get(&task_id)
            .map(|t| t.info(task_id))
            .ok_or(StoreError::TaskNotFound(task_id))
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<ActivityTaskInfo, StoreError> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::Started {
            return Err(StoreError::TaskNotStarted {
                task_id,
                status: task.status,
            });
        }
        task.status = TaskStatus::Completed;
        Ok(task.info(task_id))
    }

    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &ActivityError,
        timeout: Option<TimeoutType>,
    ) -> Result<TaskFailureOutcome, StoreError> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;

        // Schedule-to-start expiry is the only failure of a task nobody claimed
        let expected = match timeout {
            Some(TimeoutType::ScheduleToStart) => TaskStatus::Scheduled,
            _ => TaskStatus::Started,
        };
        if task.status != expected {
            return Err(StoreError::TaskNotStarted {
                task_id,
                status: task.status,
            });
        }

        task.last_error = Some(error.message.clone());

        let policy = &task.definition.options.retry_policy;
        if policy.should_retry(task.attempt, error) {
            let next_attempt = task.attempt + 1;
            let delay = policy.delay_for_attempt(next_attempt);
            let now = Utc::now();

            task.attempt = next_attempt;
            task.status = TaskStatus::Scheduled;
            task.scheduled_at = now;
            task.available_at =
                now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            task.started_at = None;
            task.last_heartbeat_at = None;
            task.claimed_by = None;

            return Ok(TaskFailureOutcome::WillRetry {
                next_attempt,
                delay,
            });
        }

        task.status = if timeout.is_some() {
            TaskStatus::TimedOut
        } else {
            TaskStatus::Failed
        };
        Ok(TaskFailureOutcome::Exhausted)
    }

    async fn expired_scheduled_tasks(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActivityTaskInfo>, StoreError> {
        let tasks = self.tasks.read();
        let mut expired: Vec<ActivityTaskInfo> = tasks
            .iter()
            .filter(|(_, t)| {
                t.status == TaskStatus::Scheduled && {
                    let timeout = chrono::Duration::from_std(
                        t.definition.options.schedule_to_start_timeout,
                    )
                    .unwrap_or_else(|_| chrono::Duration::days(36_500));
                    t.available_at + timeout <= now
                }
            })
            .map(|(id, t)| t.info(*id))
            .collect();
        expired.sort_by_key(|t| t.id);
        Ok(expired)
    }

    async fn pending_activities(&self, run_id: Uuid) -> Result<Vec<ActivityTaskInfo>, StoreError> {
        let tasks = self.tasks.read();
        let mut pending: Vec<ActivityTaskInfo> = tasks
            .iter()
            .filter(|(_, t)| t.definition.run_id == run_id && t.status.is_pending())
            .map(|(id, t)| t.info(*id))
            .collect();
        pending.sort_by_key(|t| t.id);
        Ok(pending)
    }

    async fn cancel_tasks(&self, run_id: Uuid) -> Result<usize, StoreError> {
        let mut tasks = self.tasks.write();
        let mut cancelled = 0;
        for task in tasks
            .values_mut()
            .filter(|t| t.definition.run_id == run_id && t.status.is_pending())
        {
            task.status = TaskStatus::Canceled;
            cancelled += 1;
        }
        Ok(cancelled)
    }
}
