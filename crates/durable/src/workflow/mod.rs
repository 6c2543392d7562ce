//! Workflow state machines, the actions they issue and the events they see

mod action;
mod definition;
mod event;
pub(crate) mod millis;

pub use action::{ActivityOptions, WorkflowAction};
pub use definition::{Workflow, WorkflowError};
pub use event::{CloseStatus, HistoryEvent, TimeoutType, WorkflowEvent};
