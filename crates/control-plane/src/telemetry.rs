// Logging setup
//
// Console logging through tracing-subscriber. The filter comes from RUST_LOG,
// falling back to LOG_FILTER and then to the built-in default.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str =
    "flowgate_control_plane=debug,flowgate_durable=info,flowgate_worker=info,tower_http=debug";

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// `EnvFilter` directives; `None` means the default
    pub log_filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "flowgate-control-plane".to_string(),
            log_filter: None,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_FILTER"))
                .ok()
                .filter(|s| !s.is_empty()),
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        self.log_filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Install the global subscriber
pub fn init_telemetry(config: &TelemetryConfig) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(config.filter());

    tracing_subscriber::registry().with(console_layer).init();

    tracing::debug!(service = %config.service_name, "Telemetry initialized");
}
