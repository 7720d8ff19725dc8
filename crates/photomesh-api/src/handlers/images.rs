use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use photomesh_core::models::ImageRecord;
use photomesh_services::RecordFilter;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    /// Case-insensitive exact tag match.
    pub tag: Option<String>,
    /// Case-insensitive substring match against detected object names.
    pub object: Option<String>,
    /// Case-insensitive exact mood match.
    pub mood: Option<String>,
}

/// List images in upload order, optionally filtered.
#[utoipa::path(
    get,
    path = "/api/images",
    tag = "images",
    params(ListQuery),
    responses(
        (status = 200, description = "Images in upload order", body = Vec<ImageRecord>)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "list_images"))]
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ImageRecord>>, HttpAppError> {
    let filter = RecordFilter {
        tag: query.tag,
        object: query.object,
        mood: query.mood,
    };
    Ok(Json(state.query.list(&filter).await))
}

/// Fetch one image by id.
#[utoipa::path(
    get,
    path = "/api/images/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image id")),
    responses(
        (status = 200, description = "The image record", body = ImageRecord),
        (status = 404, description = "Unknown id", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_image"))]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageRecord>, HttpAppError> {
    let record = state.query.get(id).await?;
    Ok(Json(record))
}
