// Execution backend abstraction
//
// The durable-execution engine is an external collaborator consumed through
// four operations. Any implementation of ExecutionBackend is substitutable.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::activity::ActivityAttempt;
use crate::execution::Execution;
use crate::history::HistoryEvent;

/// Errors reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("workflow execution not found: {0}")]
    NotFound(String),

    #[error("workflow execution already started: {0}")]
    AlreadyStarted(String),

    /// Backend unreachable or too slow
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Internal(String),
}

/// Parameters for starting an execution
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_list: String,
    pub input: serde_json::Value,
    pub execution_timeout: Duration,
    pub decision_timeout: Duration,
}

/// Identity of a started execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct StartedExecution {
    pub id: String,
    pub run_id: String,
}

/// Which executions a list call covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPartition {
    Open,
    Closed,
}

impl std::fmt::Display for ListPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListPartition::Open => write!(f, "open"),
            ListPartition::Closed => write!(f, "closed"),
        }
    }
}

/// Inclusive start-time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl TimeWindow {
    /// `[now - window, now]`
    pub fn trailing(now: DateTime<Utc>, window: Duration) -> Self {
        // Windows reaching past the representable range start at the earliest time
        let earliest = chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { earliest, latest: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.earliest && at <= self.latest
    }
}

/// Execution snapshot plus its live activity attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionDescription {
    pub execution: Execution,
    pub pending_activities: Vec<ActivityAttempt>,
}

/// One page of history
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryPage {
    pub events: Vec<HistoryEvent>,
    /// `None` on the last page
    pub next_page_token: Option<String>,
}

/// The four operations the facade needs from a durable-execution engine
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn start_execution(&self, request: StartRequest)
        -> Result<StartedExecution, BackendError>;

    /// Executions in `partition` whose start time falls in `window`, newest first
    async fn list_executions(
        &self,
        partition: ListPartition,
        window: TimeWindow,
        page_size: usize,
    ) -> Result<Vec<Execution>, BackendError>;

    /// Latest run when `run_id` is `None`
    async fn describe_execution(
        &self,
        id: &str,
        run_id: Option<&str>,
    ) -> Result<ExecutionDescription, BackendError>;

    async fn get_history_page(
        &self,
        id: &str,
        run_id: Option<&str>,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<HistoryPage, BackendError>;
}

/// Bound a backend call; an elapsed deadline becomes `Unavailable`
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(BackendError::Unavailable(format!(
            "call timed out after {:?}",
            limit
        )))
    })
}

enum Cursor {
    First,
    Next(String),
    Done,
}

/// Lazy, forward-only stream of history pages
///
/// Pages are fetched on demand. After a failed page the stream yields the
/// error and ends.
pub fn history_pages<'a>(
    backend: &'a dyn ExecutionBackend,
    id: &'a str,
    run_id: Option<&'a str>,
    page_size: usize,
    call_timeout: Duration,
) -> impl Stream<Item = Result<Vec<HistoryEvent>, BackendError>> + Send + 'a {
    stream::unfold(Cursor::First, move |cursor| async move {
        let token = match cursor {
            Cursor::Done => return None,
            Cursor::First => None,
            Cursor::Next(token) => Some(token),
        };

        match with_timeout(
            call_timeout,
            backend.get_history_page(id, run_id, page_size, token),
        )
        .await
        {
            Ok(page) => {
                let next = match page.next_page_token {
                    Some(token) if !token.is_empty() => Cursor::Next(token),
                    _ => Cursor::Done,
                };
                Some((Ok(page.events), next))
            }
            Err(e) => Some((Err(e), Cursor::Done)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EventType;
    use futures::StreamExt;
    use serde_json::json;

    /// Serves a fixed log in pages, failing on a chosen page
    struct PagedLog {
        events: Vec<HistoryEvent>,
        fail_on_page: Option<usize>,
    }

    #[async_trait]
    impl ExecutionBackend for PagedLog {
        async fn start_execution(&self, _: StartRequest) -> Result<StartedExecution, BackendError> {
            Err(BackendError::Internal("unsupported".into()))
        }

        async fn list_executions(
            &self,
            _: ListPartition,
            _: TimeWindow,
            _: usize,
        ) -> Result<Vec<Execution>, BackendError> {
            Ok(vec![])
        }

        async fn describe_execution(
            &self,
            id: &str,
            _: Option<&str>,
        ) -> Result<ExecutionDescription, BackendError> {
            Err(BackendError::NotFound(id.to_string()))
        }

        async fn get_history_page(
            &self,
            _: &str,
            _: Option<&str>,
            page_size: usize,
            page_token: Option<String>,
        ) -> Result<HistoryPage, BackendError> {
            let page: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            if self.fail_on_page == Some(page) {
                return Err(BackendError::Unavailable("page lost".into()));
            }
            let start = page * page_size;
            let end = (start + page_size).min(self.events.len());
            Ok(HistoryPage {
                events: self.events[start..end].to_vec(),
                next_page_token: (end < self.events.len()).then(|| (page + 1).to_string()),
            })
        }
    }

    fn log(n: i64) -> Vec<HistoryEvent> {
        let at = Utc::now();
        (1..=n)
            .map(|i| HistoryEvent::new(i, EventType::DecisionTaskScheduled, at, json!({})))
            .collect()
    }

    #[tokio::test]
    async fn test_history_pages_walks_all_pages() {
        let backend = PagedLog {
            events: log(5),
            fail_on_page: None,
        };
        let pages: Vec<_> = history_pages(&backend, "wf", None, 2, Duration::from_secs(1))
            .collect()
            .await;

        assert_eq!(pages.len(), 3);
        let ids: Vec<i64> = pages
            .into_iter()
            .flat_map(|p| p.unwrap())
            .map(|e| e.event_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_history_pages_stop_after_error() {
        let backend = PagedLog {
            events: log(5),
            fail_on_page: Some(1),
        };
        let pages: Vec<_> = history_pages(&backend, "wf", None, 2, Duration::from_secs(1))
            .collect()
            .await;

        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(matches!(pages[1], Err(BackendError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_maps_to_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, BackendError>(())
        };
        let result = with_timeout(Duration::from_secs(10), slow).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[test]
    fn test_trailing_window() {
        let now = Utc::now();
        let window = TimeWindow::trailing(now, Duration::from_secs(24 * 3600));
        assert!(window.contains(now));
        assert!(window.contains(now - chrono::Duration::hours(23)));
        assert!(!window.contains(now - chrono::Duration::hours(25)));
        assert!(!window.contains(now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_huge_trailing_window_reaches_back_to_min_time() {
        let now = Utc::now();
        let window = TimeWindow::trailing(now, Duration::from_secs(u64::MAX / 3600 * 3600));
        assert_eq!(window.earliest, DateTime::<Utc>::MIN_UTC);
        assert!(window.contains(now - chrono::Duration::days(365 * 1000)));
    }
}
