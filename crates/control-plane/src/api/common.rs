// Common DTOs for the workflow API
//
// These types are shared across endpoints.

use axum::http::StatusCode;
use axum::Json;
use flowgate_core::GatewayError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    #[schema(example = "workflowId parameter is required")]
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Convert to axum response tuple
    pub fn into_response(self, status: StatusCode) -> (StatusCode, Json<Self>) {
        (status, Json(self))
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a gateway error
///
/// Only caller input errors are 400. An unknown execution is reported as a
/// server error, the same as any other backend failure.
pub fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::StartFailed(_)
        | GatewayError::ListFailed { .. }
        | GatewayError::NotFound(_)
        | GatewayError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a gateway error and render it as `{error}`
pub fn gateway_error(err: GatewayError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("{}", err);
    } else {
        tracing::debug!("Rejected request: {}", err);
    }
    ErrorResponse::new(err.to_string()).into_response(status)
}
