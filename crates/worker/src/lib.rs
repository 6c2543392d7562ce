// Hello-World Worker
//
// Hosts the bundled durable engine for the facade: the hello-world workflow
// and activity, the activity worker pool, and the ExecutionBackend adapter
// the HTTP layer talks to.
//
// Key design decisions:
// - One in-process engine per worker; the store is in-memory
// - The facade sees the engine only through DurableBackend
// - Execution snapshots are folded from the engine history

pub mod backend;
pub mod config;
pub mod durable_worker;
pub mod hello;

// Re-export main types
pub use backend::{to_core_event, DurableBackend};
pub use config::{WorkerConfig, DEFAULT_TASK_LIST};
pub use durable_worker::DurableWorker;
pub use hello::{greeting, HelloWorldActivity, HelloWorldWorkflow, ACTIVITY_TYPE, WORKFLOW_TYPE};
