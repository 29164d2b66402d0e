use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    pub engine_ready: bool,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    // Does not trigger engine initialization; warm-up or the first request does
    let engine_ready = match state.conversion.ready_engine() {
        Some(engine) => engine.health_check().await,
        None => false,
    };

    Json(HealthResponse {
        status: if engine_ready { "ok" } else { "degraded" }.to_string(),
        engine: state.conversion.engine_type().to_string(),
        engine_ready,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
