//! Activity abstractions
//!
//! Activities are units of work that are executed by workers. They:
//! - May fail and be retried according to their retry policy
//! - Can send heartbeats to indicate liveness
//! - Are cancelled when an attempt times out

mod context;
mod definition;

pub use context::{ActivityContext, CancellationHandle, HeartbeatError};
pub use definition::{Activity, ActivityError};
