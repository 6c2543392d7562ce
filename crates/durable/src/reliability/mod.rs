//! Activity retry policies

mod retry;

pub use retry::RetryPolicy;
