// Worker configuration
// Decision: Environment variables only; the control plane loads .env before reading them

use std::time::Duration;

/// Task list the hello-world worker polls by default
pub const DEFAULT_TASK_LIST: &str = "test-worker";

pub const DEFAULT_WORKER_ID: &str = "test-worker";

/// Configuration for the hello-world worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker ID (unique identifier for this worker instance)
    pub worker_id: String,
    /// Task list the activity pool polls
    pub task_list: String,
    /// Maximum concurrent activity attempts
    pub max_concurrent_tasks: usize,
    /// How often execution and schedule-to-start deadlines are swept
    pub timeout_sweep_interval: Duration,
    /// How long shutdown waits for in-flight attempts
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: DEFAULT_WORKER_ID.to_string(),
            task_list: DEFAULT_TASK_LIST.to_string(),
            max_concurrent_tasks: 10,
            timeout_sweep_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create configuration from environment variables
    ///
    /// - `WORKER_ID` (default `test-worker`)
    /// - `TASK_LIST` (default `test-worker`)
    /// - `MAX_CONCURRENT_TASKS` (default 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let worker_id = std::env::var("WORKER_ID")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.worker_id);

        let task_list = std::env::var("TASK_LIST")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.task_list);

        let max_concurrent = std::env::var("MAX_CONCURRENT_TASKS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_concurrent_tasks);

        Self {
            worker_id,
            task_list,
            max_concurrent_tasks: max_concurrent,
            ..Self::default()
        }
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = task_list.into();
        self
    }

    pub fn with_timeout_sweep_interval(mut self, interval: Duration) -> Self {
        self.timeout_sweep_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.worker_id, "test-worker");
        assert_eq!(config.task_list, "test-worker");
        assert_eq!(config.max_concurrent_tasks, 10);
    }

    #[test]
    fn test_config_builders() {
        let config = WorkerConfig::default()
            .with_task_list("greetings")
            .with_timeout_sweep_interval(Duration::from_millis(50));
        assert_eq!(config.task_list, "greetings");
        assert_eq!(config.timeout_sweep_interval, Duration::from_millis(50));
    }
}
