//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use photomesh_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PhotoMesh API",
        version = "0.1.0",
        description = "Image ingestion and search API. Uploads are stored locally, \
analyzed by an external vision service, and queryable by tag, object, mood, and \
free text."
    ),
    paths(
        handlers::upload::upload_image,
        handlers::images::list_images,
        handlers::images::get_image,
        handlers::search::search_images,
        handlers::stats::collection_stats,
        handlers::health::health,
    ),
    components(schemas(
        models::ImageRecord,
        models::DetectedObject,
        models::Face,
        models::Scene,
        models::TextFragment,
        models::MoodSummary,
        models::CollectionStats,
        handlers::search::SearchRequest,
        handlers::search::SearchResponse,
        handlers::health::HealthResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "images", description = "Upload and browse images"),
        (name = "search", description = "Free-text search"),
        (name = "stats", description = "Collection statistics"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
