// Control plane configuration
//
// Everything comes from environment variables, optionally loaded from a .env
// file first. Unset or unparsable values fall back to defaults.

use std::time::Duration;

use axum::http::HeaderValue;
use flowgate_core::GatewayConfig;
use flowgate_worker::WorkerConfig;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds
    pub http_addr: String,
    pub gateway: GatewayConfig,
    pub worker: WorkerConfig,
    /// Origins allowed by CORS; empty means same-origin only
    pub cors_origins: Vec<HeaderValue>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            gateway: GatewayConfig::default(),
            worker: WorkerConfig::default(),
            cors_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the environment
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }

        let worker = WorkerConfig::from_env();
        let defaults = GatewayConfig::default();

        // The gateway submits to the task list the worker polls
        let mut gateway = defaults.clone().with_task_list(worker.task_list.clone());
        if let Some(window) = env_parse::<u64>("LIST_WINDOW_HOURS").and_then(list_window) {
            gateway = gateway.with_list_window(window);
        }
        if let Some(size) = env_parse::<usize>("LIST_PAGE_SIZE").filter(|n| *n > 0) {
            gateway = gateway.with_list_page_size(size);
        }
        if let Some(size) = env_parse::<usize>("HISTORY_PAGE_SIZE").filter(|n| *n > 0) {
            gateway = gateway.with_history_page_size(size);
        }
        if let Some(secs) = env_parse::<u64>("BACKEND_TIMEOUT_SECS").filter(|n| *n > 0) {
            gateway = gateway.with_backend_timeout(Duration::from_secs(secs));
        }

        Self {
            http_addr: std::env::var("HTTP_ADDR")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
            gateway,
            worker,
            cors_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),
        }
    }

    pub fn with_http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<HeaderValue>) -> Self {
        self.cors_origins = origins;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// `None` when the hour count does not fit in seconds
fn list_window(hours: u64) -> Option<Duration> {
    hours.checked_mul(60 * 60).map(Duration::from_secs)
}

/// Comma-separated origins; entries that are not valid header values are skipped
pub fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.gateway.task_list, "test-worker");
        assert_eq!(config.gateway.list_page_size, 100);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_list_window_hours() {
        assert_eq!(list_window(24), Some(Duration::from_secs(86_400)));
        assert_eq!(list_window(0), Some(Duration::ZERO));
        assert_eq!(list_window(u64::MAX), None);
        assert_eq!(list_window(u64::MAX / 3600 + 1), None);
    }

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins("https://a.example.com, https://b.example.com,,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[1], "https://b.example.com");
        assert!(parse_origins("").is_empty());
    }
}
