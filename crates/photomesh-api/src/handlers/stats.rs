use std::sync::Arc;

use axum::{extract::State, Json};
use photomesh_core::models::CollectionStats;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Aggregate statistics over the whole collection.
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Collection statistics", body = CollectionStats)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "collection_stats"))]
pub async fn collection_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CollectionStats>, HttpAppError> {
    Ok(Json(state.repository.stats().await))
}
