use std::sync::Arc;

use axum::{extract::State, Json};
use photomesh_core::models::ImageRecord;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<ImageRecord>,
}

/// Free-text search across tags, objects, scene, and mood.
///
/// An empty or whitespace-only query returns zero results rather than the
/// whole collection.
#[utoipa::path(
    post,
    path = "/api/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked matches", body = SearchResponse),
        (status = 400, description = "Malformed request body", body = crate::error::ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "search_images"))]
pub async fn search_images(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<SearchRequest>,
) -> Result<Json<SearchResponse>, HttpAppError> {
    let results = state.query.search(&request.query).await;
    Ok(Json(SearchResponse {
        query: request.query,
        count: results.len(),
        results,
    }))
}
