// Activity attempt types
//
// Live view of an activity's current attempt, as reported by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// State of an activity attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityState {
    /// Waiting for a worker to pick it up.
    Scheduled,
    /// Running on a worker.
    Started,
    Completed,
    Failed,
    TimedOut,
    Canceled,
}

impl ActivityState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActivityState::Scheduled | ActivityState::Started)
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityState::Scheduled => write!(f, "SCHEDULED"),
            ActivityState::Started => write!(f, "STARTED"),
            ActivityState::Completed => write!(f, "COMPLETED"),
            ActivityState::Failed => write!(f, "FAILED"),
            ActivityState::TimedOut => write!(f, "TIMED_OUT"),
            ActivityState::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// ActivityAttempt - one attempt of an activity within an execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityAttempt {
    pub activity_id: String,
    pub activity_type: String,
    pub state: ActivityState,
    /// 1-based attempt number.
    pub attempt_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_started_time: Option<DateTime<Utc>>,
}

impl ActivityAttempt {
    pub fn is_pending(&self) -> bool {
        !self.state.is_terminal()
    }
}
