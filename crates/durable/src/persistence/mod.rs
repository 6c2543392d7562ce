//! Persistence layer for durable execution
//!
//! This module provides:
//! - [`WorkflowEventStore`] trait for histories and the activity task queue
//! - [`InMemoryWorkflowEventStore`], the bundled implementation

mod memory;
mod store;

pub use memory::InMemoryWorkflowEventStore;
pub use store::{
    ActivityTaskInfo, ClaimedTask, ExecutionFilter, ExecutionPartition, ExecutionRecord,
    NewExecution, StoreError, TaskDefinition, TaskFailureOutcome, TaskStatus, WorkflowEventStore,
};
