//! Capability-variable analysis result.
//!
//! The external vision service is deployed in many shapes: detection-only,
//! OCR-only, or a minimal build that only does colors and emotions. Every field
//! here is independently defaultable so that decoding whatever subset the
//! deployment supports always succeeds; a missing field means the capability is
//! absent, not an error.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::record::{DetectedObject, Face, Scene, TextFragment};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default, deserialize_with = "lenient_objects")]
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub faces: Vec<Face>,
    #[serde(default)]
    pub scene: Scene,
    /// Minimal deployments send a flat caption instead of a scene object.
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub text: Vec<TextFragment>,
    #[serde(default)]
    pub colors: Vec<String>,
    /// Some deployments call these `search_keywords`.
    #[serde(default, alias = "search_keywords")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub landmarks: Vec<String>,
    /// Image-level emotion scores (label -> [0, 1]), from deployments that do
    /// color/brightness emotion mapping rather than per-face detection.
    #[serde(default)]
    pub emotions: BTreeMap<String, f32>,
    /// When the subsystem already derives a summary mood, it is used verbatim.
    #[serde(default)]
    pub overall_mood: Option<String>,
    #[serde(default)]
    pub vibe: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl ImageAnalysis {
    /// True when no capability produced anything at all.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
            && self.faces.is_empty()
            && self.scene.is_empty()
            && self.caption.is_empty()
            && self.text.is_empty()
            && self.colors.is_empty()
            && self.tags.is_empty()
            && self.landmarks.is_empty()
            && self.emotions.is_empty()
            && self.overall_mood.is_none()
    }

    /// The scene, falling back to the flat caption when no scene object came back.
    pub fn effective_scene(&self) -> Scene {
        if !self.scene.is_empty() {
            self.scene.clone()
        } else if !self.caption.is_empty() {
            Scene {
                description: self.caption.clone(),
                category: String::new(),
            }
        } else {
            Scene::default()
        }
    }
}

/// Object lists arrive with extra per-deployment fields (bounding boxes, class
/// ids); entries that lack even a name are dropped instead of failing the decode.
fn lenient_objects<'de, D>(deserializer: D) -> Result<Vec<DetectedObject>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct RawObject {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        confidence: f32,
    }

    let raw: Vec<RawObject> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|o| {
            o.name.map(|name| DetectedObject {
                name,
                confidence: o.confidence,
            })
        })
        .collect())
}
