// Router assembly
//
// Builds the full HTTP surface: health, workflow routes, OpenAPI document,
// optional CORS and request tracing.

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use flowgate_core::GatewayContext;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::openapi::ApiDoc;

/// Build the application router
///
/// CORS is only applied when `cors_origins` is non-empty.
pub fn build_app(gateway: GatewayContext, cors_origins: Vec<HeaderValue>) -> Router {
    let workflows_state = api::workflows::AppState::new(gateway);

    let app = Router::new()
        .merge(api::health::routes())
        .merge(api::workflows::routes(workflows_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let app = if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    };

    app.layer(TraceLayer::new_for_http())
}
