pub mod api;
pub mod config;
pub mod services;

use crate::config::ConverterConfig;
use crate::services::conversion::ConversionService;
use crate::services::staging::Stager;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::convert::extract_markdown,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::convert::MarkdownResponse,
            api::handlers::convert::UploadForm,
            api::handlers::health::HealthResponse,
            api::error::ErrorResponse,
        )
    ),
    tags(
        (name = "convert", description = "Document to Markdown conversion"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub conversion: Arc<ConversionService>,
    pub stager: Stager,
    pub config: ConverterConfig,
}

impl AppState {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            conversion: Arc::new(ConversionService::new(config.clone())),
            stager: Stager::from_config(&config),
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", post(api::handlers::convert::extract_markdown))
        .route(
            "/extract-markdown",
            post(api::handlers::convert::extract_markdown),
        )
        .route("/health", get(api::handlers::health::health_check))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.body_limit(),
        ))
        .with_state(state)
}
