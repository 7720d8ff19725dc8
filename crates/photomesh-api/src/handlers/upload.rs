use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use photomesh_core::models::ImageRecord;
use photomesh_core::AppError;
use photomesh_services::UploadedFile;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "image";

/// Upload an image.
///
/// Stores the bytes, runs analysis, and returns the full record. When the
/// analysis subsystem is unavailable the upload still succeeds and the record
/// comes back with empty analysis fields.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored and analyzed", body = ImageRecord),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ImageRecord>, HttpAppError> {
    let upload = extract_image_field(multipart).await?;
    let record = state.ingest.ingest(upload).await?;
    // Re-read through the query engine so related_images reflects the
    // collection the record just joined.
    let record = state.query.get(record.id).await.unwrap_or(record);
    Ok(Json(record))
}

/// Pull the `image` field out of the multipart body.
async fn extract_image_field(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(String::from)
            .ok_or_else(|| AppError::InvalidInput("Missing filename in upload".to_string()))?;
        let content_type = field
            .content_type()
            .map(String::from)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {}", e)))?
            .to_vec();

        return Ok(UploadedFile {
            filename,
            content_type,
            data,
        });
    }

    Err(AppError::InvalidInput(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}
