//! Workflow execution engine
//!
//! The engine module provides the `WorkflowExecutor`, which drives workflow
//! state machines by replaying histories and recording their actions.

mod executor;
mod registry;

pub use executor::{
    DecisionResult, ExecutorConfig, ExecutorError, StartWorkflowOptions, TimeoutSweep,
    WorkflowExecutor,
};
pub use registry::{AnyWorkflow, RegistryError, WorkflowFactory, WorkflowRegistry};
