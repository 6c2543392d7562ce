// Execution Gateway
//
// Stateless operations that turn caller requests into backend calls and hand
// the raw results to the projector. Everything an operation needs arrives in
// an immutable GatewayContext.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::backend::{
    history_pages, with_timeout, BackendError, ExecutionBackend, ListPartition, StartRequest,
    StartedExecution, TimeWindow,
};
use crate::projector::{self, TimelineEntry};
use crate::view::{ExecutionDetail, ExecutionView};

/// Workflow type started by [`start_execution`]
pub const HELLO_WORKFLOW_TYPE: &str = "hello_world_workflow";

/// Name used when the caller sends none
pub const DEFAULT_NAME: &str = "World";

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Gateway configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Task list new executions are started on
    pub task_list: String,
    pub workflow_type: String,
    pub execution_timeout: Duration,
    pub decision_timeout: Duration,
    /// Trailing start-time window covered by list
    pub list_window: Duration,
    pub list_page_size: usize,
    pub history_page_size: usize,
    /// Upper bound for every backend call
    pub backend_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            task_list: "test-worker".to_string(),
            workflow_type: HELLO_WORKFLOW_TYPE.to_string(),
            execution_timeout: Duration::from_secs(10 * 60),
            decision_timeout: Duration::from_secs(60),
            list_window: Duration::from_secs(24 * 60 * 60),
            list_page_size: 100,
            history_page_size: 100,
            backend_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = task_list.into();
        self
    }

    pub fn with_list_window(mut self, window: Duration) -> Self {
        self.list_window = window;
        self
    }

    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size.max(1);
        self
    }

    pub fn with_history_page_size(mut self, size: usize) -> Self {
        self.history_page_size = size.max(1);
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }
}

/// Immutable bundle passed to every gateway operation
#[derive(Clone)]
pub struct GatewayContext {
    backend: Arc<dyn ExecutionBackend>,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
}

impl GatewayContext {
    pub fn new(backend: Arc<dyn ExecutionBackend>, config: GatewayConfig) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &dyn ExecutionBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Gateway errors; the Display text is what callers see
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Caller input rejected before reaching the backend
    #[error("{0}")]
    Validation(String),

    #[error("Failed to start workflow: {0}")]
    StartFailed(#[source] BackendError),

    #[error("Failed to list {partition} workflows: {source}")]
    ListFailed {
        partition: ListPartition,
        #[source]
        source: BackendError,
    },

    #[error("Failed to get workflow status: {0}")]
    NotFound(#[source] BackendError),

    #[error("Failed to get workflow status: {0}")]
    Backend(#[source] BackendError),
}

/// Execution ID for a start at `now`: `hello-world-YYYYMMDD-HHMMSS`
pub fn execution_id(now: DateTime<Utc>) -> String {
    format!("hello-world-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Start a hello-world execution
///
/// Empty or missing names fall back to "World". Not retried.
#[instrument(skip(ctx))]
pub async fn start_execution(
    ctx: &GatewayContext,
    name: Option<&str>,
) -> Result<StartedExecution, GatewayError> {
    let name = name.filter(|n| !n.is_empty()).unwrap_or(DEFAULT_NAME);
    let config = ctx.config();

    let request = StartRequest {
        workflow_id: execution_id(ctx.now()),
        workflow_type: config.workflow_type.clone(),
        task_list: config.task_list.clone(),
        input: json!(name),
        execution_timeout: config.execution_timeout,
        decision_timeout: config.decision_timeout,
    };

    let started = with_timeout(
        config.backend_timeout,
        ctx.backend().start_execution(request),
    )
    .await
    .map_err(GatewayError::StartFailed)?;

    info!(workflow_id = %started.id, run_id = %started.run_id, "Started workflow");
    Ok(started)
}

/// List executions started in the trailing window, open ones first
///
/// Any partition failure fails the whole call.
#[instrument(skip(ctx))]
pub async fn list_executions(ctx: &GatewayContext) -> Result<Vec<ExecutionView>, GatewayError> {
    let config = ctx.config();
    let now = ctx.now();
    let window = TimeWindow::trailing(now, config.list_window);

    let mut views = Vec::new();
    for partition in [ListPartition::Open, ListPartition::Closed] {
        let executions = with_timeout(
            config.backend_timeout,
            ctx.backend()
                .list_executions(partition, window, config.list_page_size),
        )
        .await
        .map_err(|source| GatewayError::ListFailed { partition, source })?;

        debug!(%partition, count = executions.len(), "Listed executions");
        views.extend(executions.iter().map(|e| ExecutionView::new(e, now)));
    }

    Ok(views)
}

/// Current status of one execution, with its pending activities
#[instrument(skip(ctx))]
pub async fn describe_execution(
    ctx: &GatewayContext,
    id: &str,
    run_id: Option<&str>,
) -> Result<ExecutionDetail, GatewayError> {
    require_id(id)?;
    let run_id = run_id.filter(|r| !r.is_empty());

    let description = with_timeout(
        ctx.config().backend_timeout,
        ctx.backend().describe_execution(id, run_id),
    )
    .await
    .map_err(|e| match e {
        BackendError::NotFound(_) => GatewayError::NotFound(e),
        other => GatewayError::Backend(other),
    })?;

    let pending = projector::pending_activities(&description.pending_activities);
    Ok(ExecutionDetail::new(
        &description.execution,
        pending,
        ctx.now(),
    ))
}

/// Display timeline of one execution
///
/// A failed page ends the walk; the events gathered so far are returned.
#[instrument(skip(ctx))]
pub async fn get_history(
    ctx: &GatewayContext,
    id: &str,
    run_id: Option<&str>,
) -> Result<Vec<TimelineEntry>, GatewayError> {
    require_id(id)?;
    let run_id = run_id.filter(|r| !r.is_empty());
    let config = ctx.config();

    let pages = history_pages(
        ctx.backend(),
        id,
        run_id,
        config.history_page_size,
        config.backend_timeout,
    );
    futures::pin_mut!(pages);

    let mut entries = Vec::new();
    while let Some(page) = pages.next().await {
        match page {
            Ok(events) => entries.extend(events.iter().map(projector::timeline_entry)),
            Err(e) => {
                warn!(
                    workflow_id = %id,
                    gathered = entries.len(),
                    "Returning partial history: {}",
                    e
                );
                break;
            }
        }
    }

    Ok(entries)
}

fn require_id(id: &str) -> Result<(), GatewayError> {
    if id.is_empty() {
        return Err(GatewayError::Validation(
            "workflowId parameter is required".to_string(),
        ));
    }
    Ok(())
}
