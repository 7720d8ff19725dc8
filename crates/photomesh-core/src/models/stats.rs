//! Aggregate statistics over the whole collection.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CollectionStats {
    pub total_images: usize,
    /// Sum of detected objects across all records.
    pub total_objects: usize,
    pub total_faces: usize,
    /// Count of distinct tags across the collection (case-insensitive).
    pub total_tags: usize,
    /// Mean confidence across records; 0.0 for an empty collection.
    pub avg_confidence: f32,
}
