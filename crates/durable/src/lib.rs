//! In-process durable execution engine
//!
//! Runs are event sourced with Cadence-style histories. A run's state exists
//! only as its event log; every decision rebuilds the workflow by replaying
//! that log and records the actions produced by events it has not seen yet.
//!
//! How a run moves:
//!
//! 1. [`WorkflowExecutor::start_workflow`] records `WorkflowExecutionStarted`
//!    and runs the first decision, which usually schedules an activity.
//! 2. Scheduling enqueues a task on the run's task list in the
//!    [`WorkflowEventStore`].
//! 3. A [`WorkerPool`] claims the task, runs the registered [`Activity`] under
//!    its start-to-close and heartbeat timeouts, and reports the outcome.
//! 4. The outcome lands in the history and triggers the next decision, until a
//!    decision completes or fails the run.
//!
//! Execution and schedule-to-start timeouts are swept by the pool's sweep loop.
//! Retries follow each activity's [`RetryPolicy`]; the default allows one
//! attempt.

pub mod activity;
pub mod engine;
pub mod persistence;
pub mod reliability;
pub mod worker;
pub mod workflow;

pub mod prelude {
    pub use crate::activity::{Activity, ActivityContext, ActivityError};
    pub use crate::engine::{
        ExecutorConfig, ExecutorError, StartWorkflowOptions, WorkflowExecutor, WorkflowRegistry,
    };
    pub use crate::persistence::{
        ClaimedTask, ExecutionFilter, ExecutionRecord, InMemoryWorkflowEventStore, StoreError,
        WorkflowEventStore,
    };
    pub use crate::reliability::RetryPolicy;
    pub use crate::worker::{WorkerPool, WorkerPoolConfig, WorkerPoolError};
    pub use crate::workflow::{
        ActivityOptions, CloseStatus, HistoryEvent, TimeoutType, Workflow, WorkflowAction,
        WorkflowError, WorkflowEvent,
    };
}

pub use activity::{Activity, ActivityContext, ActivityError};
pub use engine::{
    ExecutorConfig, ExecutorError, StartWorkflowOptions, WorkflowExecutor, WorkflowRegistry,
};
pub use persistence::{InMemoryWorkflowEventStore, StoreError, WorkflowEventStore};
pub use reliability::RetryPolicy;
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolError};
pub use workflow::{
    ActivityOptions, CloseStatus, HistoryEvent, TimeoutType, Workflow, WorkflowAction,
    WorkflowError, WorkflowEvent,
};
