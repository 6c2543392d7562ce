//! Worker pool for activity execution
//!
//! Claims activity tasks from one task list, runs them with bounded
//! concurrency and reports outcomes to the executor. A second loop sweeps
//! execution and schedule-to-start timeouts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::poller::{PollerConfig, TaskPoller};
use crate::activity::{Activity, ActivityContext, ActivityError};
use crate::engine::WorkflowExecutor;
use crate::persistence::ClaimedTask;
use crate::workflow::TimeoutType;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Identity recorded on ActivityTaskStarted events
    pub worker_id: String,

    /// Task list to poll
    pub task_list: String,

    /// Maximum concurrent activity executions
    pub max_concurrency: usize,

    pub poller: PollerConfig,

    /// How often execution and schedule-to-start timeouts are checked
    #[serde(with = "crate::workflow::millis")]
    pub timeout_sweep_interval: Duration,

    /// Graceful shutdown timeout
    #[serde(with = "crate::workflow::millis")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::now_v7()),
            task_list: "default".to_string(),
            max_concurrency: 10,
            poller: PollerConfig::default(),
            timeout_sweep_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration polling `task_list`
    pub fn new(task_list: impl Into<String>) -> Self {
        Self {
            task_list: task_list.into(),
            ..Default::default()
        }
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Set maximum concurrency (at least 1)
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_poller(mut self, config: PollerConfig) -> Self {
        self.poller = config;
        self
    }

    pub fn with_timeout_sweep_interval(mut self, interval: Duration) -> Self {
        self.timeout_sweep_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolStatus {
    /// Worker is starting up
    Starting,
    /// Worker is running and accepting tasks
    Running,
    /// Worker is draining (completing current tasks, not accepting new ones)
    Draining,
    /// Worker has stopped
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Worker already running
    #[error("worker pool is already running")]
    AlreadyRunning,

    /// Shutdown timeout
    #[error("graceful shutdown timed out")]
    ShutdownTimeout,
}

/// Activity execution result
pub type ActivityResult = Result<Value, ActivityError>;

/// Activity handler function type
pub type ActivityHandler = Arc<
    dyn Fn(ActivityContext, Value) -> Pin<Box<dyn Future<Output = ActivityResult> + Send>>
        + Send
        + Sync,
>;

/// Worker pool for executing activities
///
/// # Example
///
/// ```ignore
/// use flowgate_durable::worker::{WorkerPool, WorkerPoolConfig};
///
/// let pool = WorkerPool::new(executor, WorkerPoolConfig::new("test-worker"));
/// pool.register_activity(HelloWorldActivity);
///
/// pool.start().await?;
///
/// // ... later, graceful shutdown
/// pool.shutdown().await?;
/// ```
pub struct WorkerPool {
    executor: Arc<WorkflowExecutor>,
    config: WorkerPoolConfig,
    handlers: parking_lot::RwLock<HashMap<String, ActivityHandler>>,
    shutdown_tx: watch::Sender<bool>,
    status: parking_lot::RwLock<WorkerPoolStatus>,
    active_tasks: Arc<Semaphore>,
    poll_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
    sweep_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(executor: Arc<WorkflowExecutor>, config: WorkerPoolConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            executor,
            active_tasks: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            handlers: parking_lot::RwLock::new(HashMap::new()),
            shutdown_tx,
            status: parking_lot::RwLock::new(WorkerPoolStatus::Stopped),
            poll_handle: parking_lot::Mutex::new(None),
            sweep_handle: parking_lot::Mutex::new(None),
        }
    }

    /// Register a typed activity
    pub fn register_activity<A: Activity>(&self, activity: A) {
        let activity = Arc::new(activity);
        self.register_handler(A::TYPE, move |ctx, input| {
            let activity = Arc::clone(&activity);
            async move {
                let input: A::Input = serde_json::from_value(input).map_err(|e| {
                    ActivityError::non_retryable(format!("invalid activity input: {}", e))
                })?;
                let output = activity.execute(&ctx, input).await?;
                serde_json::to_value(output).map_err(|e| {
                    ActivityError::non_retryable(format!("invalid activity output: {}", e))
                })
            }
        });
    }

    /// Register an activity handler working on raw JSON
    ///
    /// Handlers registered after [`start`](Self::start) are picked up on the
    /// next start.
    pub fn register_handler<F, Fut>(&self, activity_type: &str, handler: F)
    where
        F: Fn(ActivityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActivityResult> + Send + 'static,
    {
        let handler: ActivityHandler = Arc::new(
            move |ctx, input| -> Pin<Box<dyn Future<Output = ActivityResult> + Send>> {
                Box::pin(handler(ctx, input))
            },
        );
        self.handlers
            .write()
            .insert(activity_type.to_string(), handler);
    }

    /// Start the worker pool
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn start(&self) -> Result<(), WorkerPoolError> {
        {
            let mut status = self.status.write();
            if *status != WorkerPoolStatus::Stopped {
                return Err(WorkerPoolError::AlreadyRunning);
            }
            *status = WorkerPoolStatus::Starting;
        }

        let handlers = self.handlers.read().clone();
        let mut activity_types: Vec<String> = handlers.keys().cloned().collect();
        activity_types.sort();

        info!(
            task_list = %self.config.task_list,
            activity_types = ?activity_types,
            max_concurrency = self.config.max_concurrency,
            "Starting worker pool"
        );

        self.shutdown_tx.send_replace(false);
        *self.status.write() = WorkerPoolStatus::Running;

        self.start_poll_loop(handlers, activity_types);
        self.start_sweep_loop();

        Ok(())
    }

    /// Shutdown the worker pool gracefully
    ///
    /// Stops polling, then waits for running activities up to the configured
    /// shutdown timeout.
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn shutdown(&self) -> Result<(), WorkerPoolError> {
        if *self.status.read() == WorkerPoolStatus::Stopped {
            return Ok(());
        }

        info!("Initiating graceful shutdown");

        *self.status.write() = WorkerPoolStatus::Draining;
        self.shutdown_tx.send_replace(true);

        let loops = [self.poll_handle.lock().take(), self.sweep_handle.lock().take()];
        for handle in loops.into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!("Worker loop ended abnormally: {}", e);
            }
        }

        let deadline = Instant::now() + self.config.shutdown_timeout;
        loop {
            let available = self.active_tasks.available_permits();
            if available == self.config.max_concurrency {
                debug!("All tasks completed");
                break;
            }

            if Instant::now() >= deadline {
                warn!(
                    remaining_tasks = self.config.max_concurrency - available,
                    "Shutdown timeout reached"
                );
                *self.status.write() = WorkerPoolStatus::Stopped;
                return Err(WorkerPoolError::ShutdownTimeout);
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        *self.status.write() = WorkerPoolStatus::Stopped;
        info!("Worker pool stopped");
        Ok(())
    }

    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read()
    }

    /// Number of activities currently executing
    pub fn current_load(&self) -> usize {
        self.config.max_concurrency - self.active_tasks.available_permits()
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    pub fn task_list(&self) -> &str {
        &self.config.task_list
    }

    fn start_poll_loop(&self, handlers: HashMap<String, ActivityHandler>, activity_types: Vec<String>) {
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();
        let active_tasks = Arc::clone(&self.active_tasks);
        let shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut poller = TaskPoller::new(
                Arc::clone(executor.store()),
                config.worker_id.clone(),
                config.task_list.clone(),
                activity_types,
                config.poller.clone(),
                shutdown_rx,
            );

            loop {
                if poller.is_shutdown() {
                    debug!("Poll loop: shutdown requested");
                    break;
                }

                let available_slots = active_tasks.available_permits();
                if available_slots == 0 {
                    if poller.wait().await {
                        break;
                    }
                    continue;
                }

                match poller.poll(available_slots).await {
                    Ok(tasks) => {
                        for task in tasks {
                            // Claims never exceed the free permits, so this only
                            // waits if a slot was taken between the two.
                            let Ok(permit) = Arc::clone(&active_tasks).acquire_owned().await else {
                                error!(task_id = %task.id, "Worker pool semaphore closed");
                                break;
                            };

                            let handler = handlers.get(&task.activity_type).cloned();
                            let executor = Arc::clone(&executor);
                            let worker_id = config.worker_id.clone();

                            tokio::spawn(async move {
                                run_task(executor, handler, task, worker_id).await;
                                drop(permit);
                            });
                        }
                    }
                    Err(e) => {
                        error!("Poll error: {}", e);
                    }
                }

                if poller.wait().await {
                    break;
                }
            }

            debug!("Poll loop exited");
        });

        *self.poll_handle.lock() = Some(handle);
    }

    fn start_sweep_loop(&self) {
        let executor = Arc::clone(&self.executor);
        let interval = self.config.timeout_sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = executor.enforce_timeouts(Utc::now()).await {
                            error!("Timeout sweep failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Sweep loop: shutdown requested");
                        break;
                    }
                }
            }

            debug!("Sweep loop exited");
        });

        *self.sweep_handle.lock() = Some(handle);
    }
}

/// Run one claimed attempt and report its outcome
async fn run_task(
    executor: Arc<WorkflowExecutor>,
    handler: Option<ActivityHandler>,
    task: ClaimedTask,
    worker_id: String,
) {
    let task_id = task.id;

    if let Err(e) = executor.on_activity_started(&task, &worker_id).await {
        warn!(%task_id, "Failed to record activity start: {}", e);
    }

    let outcome = match handler {
        Some(handler) => execute_attempt(&executor, handler, &task).await,
        None => Err((
            ActivityError::non_retryable(format!(
                "no handler registered for activity type: {}",
                task.activity_type
            )),
            None,
        )),
    };

    let reported = match outcome {
        Ok(result) => {
            debug!(%task_id, activity_type = %task.activity_type, "Activity completed");
            executor.on_activity_completed(task_id, result).await
        }
        Err((error, timeout)) => {
            warn!(
                %task_id,
                activity_type = %task.activity_type,
                attempt = task.attempt,
                "Activity attempt failed: {}",
                error
            );
            executor.on_activity_failed(task_id, error, timeout).await
        }
    };

    if let Err(e) = reported {
        error!(%task_id, "Failed to report activity outcome: {}", e);
    }
}

/// Execute the handler under the start-to-close and heartbeat timeouts
async fn execute_attempt(
    executor: &WorkflowExecutor,
    handler: ActivityHandler,
    task: &ClaimedTask,
) -> Result<Value, (ActivityError, Option<TimeoutType>)> {
    let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel(16);
    let ctx = ActivityContext::new(
        task.id,
        task.workflow_id.clone(),
        task.run_id,
        task.activity_id.clone(),
        task.attempt,
        task.max_attempts,
    )
    .with_heartbeat(heartbeat_tx);
    let cancellation = ctx.cancellation_handle();

    let execution = handler(ctx, task.input.clone());
    tokio::pin!(execution);

    let start_to_close = tokio::time::sleep(task.options.start_to_close_timeout);
    tokio::pin!(start_to_close);

    let heartbeat_timeout = task.options.heartbeat_timeout;
    let mut last_heartbeat = Instant::now();

    loop {
        let heartbeat_deadline = heartbeat_timeout.map(|t| last_heartbeat + t);

        tokio::select! {
            result = &mut execution => return result.map_err(|e| (e, None)),
            _ = &mut start_to_close => {
                cancellation.cancel();
                return Err(timed_out(TimeoutType::StartToClose));
            }
            Some(_) = heartbeat_rx.recv() => {
                last_heartbeat = Instant::now();
                if let Err(e) = executor.store().heartbeat_task(task.id).await {
                    debug!(task_id = %task.id, "Failed to record heartbeat: {}", e);
                }
            }
            _ = sleep_until(heartbeat_deadline) => {
                cancellation.cancel();
                return Err(timed_out(TimeoutType::Heartbeat));
            }
        }
    }
}

fn timed_out(timeout_type: TimeoutType) -> (ActivityError, Option<TimeoutType>) {
    (ActivityError::timed_out(timeout_type), Some(timeout_type))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
