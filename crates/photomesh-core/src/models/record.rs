//! Image record: the stored entity holding an image's storage reference plus all
//! derived analysis attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;
use uuid::Uuid;

/// A detected object with its confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f32,
}

/// A detected face: detection confidence plus per-emotion scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Face {
    pub confidence: f32,
    /// Emotion label -> score in [0, 1]. Ordered map for stable serialization.
    #[serde(default)]
    pub emotions: BTreeMap<String, f32>,
}

/// Scene description; either field may be empty when the capability is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Scene {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl Scene {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && self.category.is_empty()
    }
}

/// A fragment of recognized text (OCR).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TextFragment {
    pub text: String,
    pub confidence: f32,
}

/// Summary mood derived from faces/scene, not per-face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MoodSummary {
    pub overall_mood: String,
    pub vibe: String,
}

impl Default for MoodSummary {
    fn default() -> Self {
        MoodSummary {
            overall_mood: "neutral".to_string(),
            vibe: "balanced".to_string(),
        }
    }
}

/// The central entity: one uploaded image and everything derived from it.
///
/// A record is created with default analysis fields as soon as the bytes are
/// durably stored, then replaced wholesale once analysis completes. Every list
/// field defaults to empty rather than being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageRecord {
    pub id: Uuid,
    /// Location to retrieve the raw bytes; set once at creation.
    pub url: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: usize,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub faces: Vec<Face>,
    #[serde(default)]
    pub scene: Scene,
    #[serde(default)]
    pub text: Vec<TextFragment>,
    #[serde(default)]
    pub emotions: MoodSummary,
    /// De-duplicated labels, first-seen order preserved.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub landmarks: Vec<String>,
    /// Identifiers of similar images; never contains this record's own id.
    #[serde(default)]
    pub related_images: Vec<Uuid>,
    /// Aggregate analysis certainty in [0, 1]; 0.0 when analysis failed entirely.
    #[serde(default)]
    pub confidence: f32,
    pub uploaded_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Create a record in its pre-analysis state: stored bytes, empty analysis.
    pub fn pending(
        id: Uuid,
        url: String,
        original_filename: String,
        content_type: String,
        file_size: usize,
    ) -> Self {
        ImageRecord {
            id,
            url,
            original_filename,
            content_type,
            file_size,
            objects: Vec::new(),
            faces: Vec::new(),
            scene: Scene::default(),
            text: Vec::new(),
            emotions: MoodSummary::default(),
            tags: Vec::new(),
            colors: Vec::new(),
            landmarks: Vec::new(),
            related_images: Vec::new(),
            confidence: 0.0,
            uploaded_at: Utc::now(),
        }
    }

    /// Lowercased tag set, used for similarity computation.
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.tags.iter().map(|t| t.to_lowercase()).collect()
    }
}

/// Clamp a confidence score into [0, 1]; NaN collapses to 0.0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
