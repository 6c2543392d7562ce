//! Worker pool for activity execution
//!
//! This module provides:
//! - [`WorkerPool`] - Runs activities from one task list with bounded concurrency
//! - [`TaskPoller`] - Task polling with exponential backoff
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                             │
//! │  ┌─────────────┐                     ┌─────────────────────┐  │
//! │  │ TaskPoller  │                     │   Timeout sweep     │  │
//! │  │  (polling)  │                     │ (execution, sched.) │  │
//! │  └──────┬──────┘                     └─────────────────────┘  │
//! │         │                                                     │
//! │         ▼                                                     │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │        Activity attempts (Semaphore-limited)          │    │
//! │  │  start-to-close timer, heartbeat watchdog             │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │         │                                                     │
//! │         ▼                                                     │
//! │   WorkflowExecutor::on_activity_completed / _failed           │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod poller;
mod pool;

pub use poller::{PollerConfig, PollerError, TaskPoller};
pub use pool::{
    ActivityHandler, ActivityResult, WorkerPool, WorkerPoolConfig, WorkerPoolError,
    WorkerPoolStatus,
};
