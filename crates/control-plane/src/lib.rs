// Flowgate Control Plane Library
// Decision: Shared library for binaries (API server, OpenAPI export) and integration tests

// API routes and types (shared for OpenAPI generation)
pub mod api;

pub mod app;
pub mod config;
pub mod openapi;
pub mod telemetry;

pub use app::build_app;
pub use config::AppConfig;
