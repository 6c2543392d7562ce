// OpenAPI specification generation
//
// Used by the server (Swagger UI and /api-doc/openapi.json) and by the
// export-openapi binary.

use crate::api;
use flowgate_core::{
    ActivityState, ExecutionDetail, ExecutionStatus, ExecutionView, PendingActivityView,
    TimelineEntry,
};
use utoipa::OpenApi;

/// OpenAPI documentation for the Flowgate API
#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::workflows::start_workflow,
        api::workflows::list_workflows,
        api::workflows::get_workflow_status,
        api::workflows::get_workflow_history,
    ),
    components(
        schemas(
            ExecutionStatus, ActivityState,
            ExecutionView, ExecutionDetail, PendingActivityView, TimelineEntry,
            api::health::HealthResponse,
            api::workflows::StartWorkflowRequest,
            api::workflows::StartWorkflowResponse,
            api::workflows::ListWorkflowsResponse,
            api::workflows::WorkflowHistoryResponse,
            api::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "workflows", description = "Start, list and inspect hello-world executions")
    ),
    info(
        title = "Flowgate API",
        version = "0.2.0",
        description = "HTTP facade over a durable workflow engine",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
