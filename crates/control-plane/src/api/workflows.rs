// Workflow HTTP routes
//
// Thin adapters from HTTP to the gateway operations: decode the request,
// call the gateway, wrap the result.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use flowgate_core::gateway::{self, GatewayContext};
use flowgate_core::{ExecutionDetail, ExecutionView, TimelineEntry};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{gateway_error, ApiError, ErrorResponse};

pub const START_MESSAGE: &str = "Workflow started successfully";

/// App state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayContext>,
}

impl AppState {
    pub fn new(gateway: GatewayContext) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

/// Request to start a hello-world execution
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StartWorkflowRequest {
    /// Name to greet. Empty or missing means "World".
    #[serde(default)]
    #[schema(example = "Ada")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowResponse {
    #[schema(example = "hello-world-20240501-120000")]
    pub workflow_id: String,
    pub run_id: String,
    #[schema(example = "Workflow started successfully")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListWorkflowsResponse {
    /// Open executions first, then closed ones
    pub workflows: Vec<ExecutionView>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowHistoryResponse {
    pub workflow_id: String,
    /// The `runId` query value as given, empty when absent
    pub run_id: String,
    pub events: Vec<TimelineEntry>,
    pub count: usize,
}

/// Execution selector shared by status and history
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WorkflowQuery {
    /// Workflow ID (required)
    #[serde(default)]
    pub workflow_id: String,
    /// Run ID; latest run when empty
    #[serde(default)]
    pub run_id: String,
}

impl WorkflowQuery {
    fn run_id(&self) -> Option<&str> {
        Some(self.run_id.as_str()).filter(|r| !r.is_empty())
    }
}

/// Create workflow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/workflows/start", post(start_workflow))
        .route("/api/workflows/list", get(list_workflows))
        .route("/api/workflows/status", get(get_workflow_status))
        .route("/api/workflows/history", get(get_workflow_history))
        .with_state(state)
}

/// POST /api/workflows/start - Start a hello-world execution
#[utoipa::path(
    post,
    path = "/api/workflows/start",
    request_body = StartWorkflowRequest,
    responses(
        (status = 200, description = "Execution started", body = StartWorkflowResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 500, description = "Backend rejected the start", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn start_workflow(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StartWorkflowResponse>, ApiError> {
    let req: StartWorkflowRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Invalid start request: {}", e);
        ErrorResponse::new("Invalid request body").into_response(StatusCode::BAD_REQUEST)
    })?;

    let started = gateway::start_execution(&state.gateway, req.name.as_deref())
        .await
        .map_err(gateway_error)?;

    Ok(Json(StartWorkflowResponse {
        workflow_id: started.id,
        run_id: started.run_id,
        message: START_MESSAGE.to_string(),
    }))
}

/// GET /api/workflows/list - Executions started in the trailing window
#[utoipa::path(
    get,
    path = "/api/workflows/list",
    responses(
        (status = 200, description = "Open and closed executions", body = ListWorkflowsResponse),
        (status = 500, description = "Listing a partition failed", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ListWorkflowsResponse>, ApiError> {
    let workflows = gateway::list_executions(&state.gateway)
        .await
        .map_err(gateway_error)?;

    Ok(Json(ListWorkflowsResponse {
        count: workflows.len(),
        workflows,
    }))
}

/// GET /api/workflows/status - Current status of one execution
#[utoipa::path(
    get,
    path = "/api/workflows/status",
    params(WorkflowQuery),
    responses(
        (status = 200, description = "Execution status", body = ExecutionDetail),
        (status = 400, description = "workflowId missing", body = ErrorResponse),
        (status = 500, description = "Execution unknown or backend failure", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn get_workflow_status(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<ExecutionDetail>, ApiError> {
    let detail = gateway::describe_execution(&state.gateway, &query.workflow_id, query.run_id())
        .await
        .map_err(gateway_error)?;

    Ok(Json(detail))
}

/// GET /api/workflows/history - Display timeline of one execution
///
/// A history that cannot be read completely is returned as far as it got.
#[utoipa::path(
    get,
    path = "/api/workflows/history",
    params(WorkflowQuery),
    responses(
        (status = 200, description = "Execution timeline", body = WorkflowHistoryResponse),
        (status = 400, description = "workflowId missing", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn get_workflow_history(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<WorkflowHistoryResponse>, ApiError> {
    let events = gateway::get_history(&state.gateway, &query.workflow_id, query.run_id())
        .await
        .map_err(gateway_error)?;

    Ok(Json(WorkflowHistoryResponse {
        workflow_id: query.workflow_id,
        run_id: query.run_id,
        count: events.len(),
        events,
    }))
}
