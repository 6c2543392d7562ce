// Execution Facade Core
//
// This crate provides the backend-agnostic half of the facade: the execution
// record model, the history projector and the execution gateway.
//
// Key design decisions:
// - The event log is the only source of truth; snapshots are re-derived by folding it
// - The projector is pure and synchronous, the gateway is the only async layer
// - Backends plug in through the ExecutionBackend trait (four operations)
// - Gateway operations take an explicit, immutable GatewayContext
// - Event types form an open enum so unknown backend events pass through

// Domain entity types
pub mod activity;
pub mod execution;
pub mod history;

pub mod backend;
pub mod duration;
pub mod gateway;
pub mod projector;
pub mod view;

// Re-exports for convenience
pub use activity::{ActivityAttempt, ActivityState};
pub use backend::{
    BackendError, ExecutionBackend, ExecutionDescription, HistoryPage, ListPartition,
    StartRequest, StartedExecution, TimeWindow,
};
pub use execution::{Execution, ExecutionStatus};
pub use gateway::{Clock, FixedClock, GatewayConfig, GatewayContext, GatewayError, SystemClock};
pub use history::{EventType, HistoryEvent};
pub use projector::{fold_history, timeline, PendingActivityView, ProjectionError, TimelineEntry};
pub use view::{ExecutionDetail, ExecutionView};
