use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the analysis subsystem currently answers its health probe.
    /// The service stays up (and degrades uploads) either way.
    pub vision_reachable: bool,
    pub images: usize,
}

/// Liveness probe with a vision reachability flag.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        vision_reachable: state.vision.health().await,
        images: state.repository.len().await,
    })
}
