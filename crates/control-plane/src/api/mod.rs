// HTTP API routes
//
// Each submodule handles one group of routes.

pub mod common;
pub mod health;
pub mod workflows;

// Re-export common types
pub use common::{ApiError, ErrorResponse};
