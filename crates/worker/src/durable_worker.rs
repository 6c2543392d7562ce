// Hello-world durable worker
// Decision: The worker owns the engine (store, executor, pool); the facade only gets a DurableBackend
// Decision: Workflow and activity registration happen once, before the pool starts

use std::sync::Arc;

use anyhow::{Context, Result};
use flowgate_durable::{
    ExecutorConfig, InMemoryWorkflowEventStore, WorkerPool, WorkerPoolConfig,
    WorkflowEventStore, WorkflowExecutor,
};
use tracing::info;

use crate::backend::DurableBackend;
use crate::config::WorkerConfig;
use crate::hello::{HelloWorldActivity, HelloWorldWorkflow};

/// Engine plus activity pool for the hello-world task list
pub struct DurableWorker {
    config: WorkerConfig,
    executor: Arc<WorkflowExecutor>,
    pool: WorkerPool,
}

impl DurableWorker {
    /// Create a worker over a fresh in-memory store
    pub fn new(config: WorkerConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryWorkflowEventStore::new()))
    }

    /// Create a worker over an existing store
    pub fn with_store(config: WorkerConfig, store: Arc<dyn WorkflowEventStore>) -> Self {
        info!(
            worker_id = %config.worker_id,
            task_list = %config.task_list,
            max_concurrent = config.max_concurrent_tasks,
            "Initializing durable worker"
        );

        let mut executor = WorkflowExecutor::with_config(
            store,
            ExecutorConfig::default().with_identity(config.worker_id.clone()),
        );
        executor.register::<HelloWorldWorkflow>();
        let executor = Arc::new(executor);

        let pool = WorkerPool::new(
            executor.clone(),
            WorkerPoolConfig::new(config.task_list.clone())
                .with_worker_id(config.worker_id.clone())
                .with_max_concurrency(config.max_concurrent_tasks)
                .with_timeout_sweep_interval(config.timeout_sweep_interval)
                .with_shutdown_timeout(config.shutdown_timeout),
        );
        pool.register_activity(HelloWorldActivity);

        Self {
            config,
            executor,
            pool,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(WorkerConfig::from_env())
    }

    /// Start polling the task list; returns once the pool is running
    pub async fn start(&self) -> Result<()> {
        self.pool
            .start()
            .await
            .context("Failed to start worker pool")?;

        info!(
            worker_id = %self.config.worker_id,
            task_list = %self.config.task_list,
            "Started worker"
        );
        Ok(())
    }

    /// Stop polling and wait for in-flight activities
    pub async fn shutdown(&self) -> Result<()> {
        self.pool
            .shutdown()
            .await
            .context("Worker shutdown did not complete")?;
        info!(worker_id = %self.config.worker_id, "Worker stopped");
        Ok(())
    }

    /// Backend view of this worker's engine
    pub fn backend(&self) -> DurableBackend {
        DurableBackend::new(self.executor.clone())
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor> {
        &self.executor
    }

    /// Activity pool, for registering extra or replacement handlers before start
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}
