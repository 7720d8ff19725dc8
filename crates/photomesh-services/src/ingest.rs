//! Ingestion orchestration: store, analyze, persist.
//!
//! Per-upload state machine: RECEIVED -> STORED -> ANALYZING -> COMPLETE, or
//! COMPLETE_DEGRADED when the analysis subsystem is unavailable. A storage
//! failure aborts the upload with no record; an analysis failure never does.
//!
//! Cancellation policy: once the bytes are stored the record stays, and the
//! analysis call runs in a spawned task so it completes and updates the
//! repository even if the uploading client disconnects mid-request.

use std::sync::Arc;

use photomesh_core::models::record::clamp_confidence;
use photomesh_core::models::{ImageAnalysis, ImageRecord, MoodSummary};
use photomesh_core::AppError;
use photomesh_storage::Storage;
use photomesh_vision::VisionClient;
use uuid::Uuid;

use crate::repository::ImageRepository;
use crate::validate::{MediaValidator, ValidationError};

/// One uploaded file, as extracted from the multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Coordinates store -> analyze -> persist for a single upload.
#[derive(Clone)]
pub struct IngestService {
    storage: Arc<dyn Storage>,
    vision: VisionClient,
    repository: ImageRepository,
    validator: MediaValidator,
}

impl IngestService {
    pub fn new(
        storage: Arc<dyn Storage>,
        vision: VisionClient,
        repository: ImageRepository,
        validator: MediaValidator,
    ) -> Self {
        Self {
            storage,
            vision,
            repository,
            validator,
        }
    }

    /// Ingest one upload and return the resulting record.
    ///
    /// Blocks until analysis completes or fails; the returned record is the
    /// final COMPLETE or COMPLETE_DEGRADED version.
    #[tracing::instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.data.len()))]
    pub async fn ingest(&self, upload: UploadedFile) -> Result<ImageRecord, AppError> {
        let extension = self
            .validator
            .validate(&upload.filename, &upload.content_type, upload.data.len())
            .map_err(validation_to_app_error)?;

        // The id is generated here, never derived from the client filename.
        let id = Uuid::new_v4();
        let storage_name = format!("{}.{}", id, extension);
        let analysis_bytes = upload.data.clone();

        let (_key, url) = self
            .storage
            .upload(&storage_name, &upload.content_type, upload.data)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let record = ImageRecord::pending(
            id,
            url,
            sanitize_filename(&upload.filename),
            upload.content_type.clone(),
            analysis_bytes.len(),
        );
        // STORED: visible to readers from here on, with default analysis fields.
        self.repository.insert(record.clone()).await?;

        // ANALYZING, in a spawned task so the repository is updated even when
        // the caller disconnects and this future is dropped.
        let vision = self.vision.clone();
        let repository = self.repository.clone();
        let pending = record.clone();
        let handle = tokio::spawn(async move {
            let merged = match vision.analyze(analysis_bytes).await {
                Ok(analysis) => merge_analysis(&pending, &analysis),
                Err(err) => {
                    tracing::warn!(
                        image_id = %pending.id,
                        error = %err,
                        "Analysis unavailable, keeping degraded record"
                    );
                    pending.clone()
                }
            };
            if let Err(err) = repository.update(merged.clone()).await {
                tracing::error!(image_id = %merged.id, error = %err, "Failed to persist analysis");
            }
            merged
        });

        match handle.await {
            Ok(merged) => Ok(merged),
            // The analysis task panicked; the stored record is still valid.
            Err(join_err) => {
                tracing::error!(image_id = %id, error = %join_err, "Analysis task failed");
                Ok(record)
            }
        }
    }
}

fn validation_to_app_error(err: ValidationError) -> AppError {
    match err {
        ValidationError::FileTooLarge { size, max } => {
            AppError::PayloadTooLarge(format!("{} bytes exceeds max {} bytes", size, max))
        }
        other => AppError::InvalidInput(other.to_string()),
    }
}

/// Strip any path components from the client-supplied filename.
fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .to_string()
}

/// Merge a capability-variable analysis into a pending record, deriving tags,
/// the mood summary, and the aggregate confidence.
pub fn merge_analysis(record: &ImageRecord, analysis: &ImageAnalysis) -> ImageRecord {
    let mut merged = record.clone();

    merged.objects = analysis
        .objects
        .iter()
        .map(|o| photomesh_core::models::DetectedObject {
            name: o.name.clone(),
            confidence: clamp_confidence(o.confidence),
        })
        .collect();
    merged.faces = analysis
        .faces
        .iter()
        .map(|f| photomesh_core::models::Face {
            confidence: clamp_confidence(f.confidence),
            emotions: f
                .emotions
                .iter()
                .map(|(k, v)| (k.clone(), clamp_confidence(*v)))
                .collect(),
        })
        .collect();
    merged.scene = analysis.effective_scene();
    merged.text = analysis
        .text
        .iter()
        .map(|t| photomesh_core::models::TextFragment {
            text: t.text.clone(),
            confidence: clamp_confidence(t.confidence),
        })
        .collect();
    merged.colors = analysis.colors.clone();
    merged.landmarks = analysis.landmarks.clone();
    merged.tags = derive_tags(&merged, &analysis.tags);
    merged.emotions = derive_mood(analysis, &merged);
    merged.confidence = aggregate_confidence(&merged, analysis.confidence);

    merged
}

/// Tags: object names, then scene category, then colors, then whatever keywords
/// the service itself returned; de-duplicated case-insensitively, first-seen
/// order and casing preserved.
fn derive_tags(record: &ImageRecord, service_tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut tags = Vec::new();

    let candidates = record
        .objects
        .iter()
        .map(|o| o.name.as_str())
        .chain(
            (!record.scene.category.is_empty()).then_some(record.scene.category.as_str()),
        )
        .chain(record.colors.iter().map(|c| c.as_str()))
        .chain(service_tags.iter().map(|t| t.as_str()));

    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            tags.push(trimmed.to_string());
        }
    }

    tags
}

/// Fixed scene-category fallback table for mood/vibe derivation.
const SCENE_MOODS: &[(&str, &str, &str)] = &[
    ("nature", "peaceful", "serene"),
    ("landscape", "peaceful", "serene"),
    ("animal", "happy", "playful"),
    ("portrait", "calm", "intimate"),
    ("urban", "busy", "dynamic"),
    ("city", "busy", "dynamic"),
    ("night", "moody", "dramatic"),
    ("party", "joyful", "energetic"),
    ("food", "happy", "cozy"),
];

/// Derive the summary mood.
///
/// Precedence: a summary the subsystem already computed wins verbatim; then the
/// dominant emotions across faces (mean score per label); then the image-level
/// emotion map; then the scene-category table; then the neutral defaults.
fn derive_mood(analysis: &ImageAnalysis, record: &ImageRecord) -> MoodSummary {
    let mut summary = MoodSummary::default();

    let ranked = if !record.faces.is_empty() {
        ranked_emotions(
            record
                .faces
                .iter()
                .flat_map(|f| f.emotions.iter().map(|(k, v)| (k.as_str(), *v))),
        )
    } else {
        ranked_emotions(analysis.emotions.iter().map(|(k, v)| (k.as_str(), *v)))
    };

    let category = record.scene.category.to_lowercase();
    let table_entry = SCENE_MOODS.iter().find(|(c, _, _)| *c == category);

    summary.overall_mood = analysis
        .overall_mood
        .clone()
        .filter(|m| !m.is_empty())
        .or_else(|| ranked.first().map(|(label, _)| label.clone()))
        .or_else(|| table_entry.map(|(_, mood, _)| mood.to_string()))
        .unwrap_or(summary.overall_mood);

    summary.vibe = analysis
        .vibe
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| ranked.get(1).map(|(label, _)| label.clone()))
        .or_else(|| table_entry.map(|(_, _, vibe)| vibe.to_string()))
        .unwrap_or(summary.vibe);

    summary
}

/// Mean score per emotion label, ranked descending; label order breaks ties so
/// the result is deterministic.
fn ranked_emotions<'a>(scores: impl Iterator<Item = (&'a str, f32)>) -> Vec<(String, f32)> {
    let mut sums: std::collections::BTreeMap<&str, (f32, u32)> = std::collections::BTreeMap::new();
    for (label, score) in scores {
        let entry = sums.entry(label).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;
    }
    let mut means: Vec<(String, f32)> = sums
        .into_iter()
        .map(|(label, (sum, count))| (label.to_string(), sum / count as f32))
        .collect();
    means.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    means
}

/// Mean over all component confidences; the service-level figure is used only
/// when no components exist, and a fully failed analysis stays at 0.0.
fn aggregate_confidence(record: &ImageRecord, service_confidence: Option<f32>) -> f32 {
    let components: Vec<f32> = record
        .objects
        .iter()
        .map(|o| o.confidence)
        .chain(record.faces.iter().map(|f| f.confidence))
        .chain(record.text.iter().map(|t| t.confidence))
        .collect();

    if components.is_empty() {
        return service_confidence.map(clamp_confidence).unwrap_or(0.0);
    }
    clamp_confidence(components.iter().sum::<f32>() / components.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use photomesh_core::models::{DetectedObject, Face, Scene};
    use photomesh_storage::{LocalStorage, StorageError, StorageResult};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn pending() -> ImageRecord {
        ImageRecord::pending(
            Uuid::new_v4(),
            "http://localhost/uploads/test.png".to_string(),
            "test.png".to_string(),
            "image/png".to_string(),
            16,
        )
    }

    fn analysis_from(json: &str) -> ImageAnalysis {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_derive_tags_order_and_dedup() {
        let mut record = pending();
        record.objects = vec![
            DetectedObject {
                name: "cat".to_string(),
                confidence: 0.9,
            },
            DetectedObject {
                name: "Cat".to_string(),
                confidence: 0.8,
            },
        ];
        record.scene = Scene {
            description: String::new(),
            category: "animal".to_string(),
        };
        record.colors = vec!["black".to_string(), "cat".to_string()];

        let tags = derive_tags(&record, &["indoor".to_string()]);
        assert_eq!(tags, vec!["cat", "animal", "black", "indoor"]);
    }

    #[test]
    fn test_merge_full_analysis() {
        let record = pending();
        let analysis = analysis_from(
            r#"{
                "objects": [{"name": "cat", "confidence": 0.9}],
                "colors": ["black"],
                "scene": {"description": "a black cat", "category": "animal"},
                "text": [{"text": "hi", "confidence": 0.7}]
            }"#,
        );

        let merged = merge_analysis(&record, &analysis);
        assert_eq!(merged.id, record.id);
        assert_eq!(merged.url, record.url);
        assert_eq!(merged.objects.len(), 1);
        assert_eq!(merged.tags, vec!["cat", "animal", "black"]);
        // Mean of 0.9 (object) and 0.7 (text).
        assert!((merged.confidence - 0.8).abs() < 1e-6);
        // No emotions anywhere: scene table for "animal".
        assert_eq!(merged.emotions.overall_mood, "happy");
        assert_eq!(merged.emotions.vibe, "playful");
    }

    #[test]
    fn test_merge_confidences_clamped() {
        let record = pending();
        let analysis = analysis_from(r#"{"objects": [{"name": "sun", "confidence": 1.7}]}"#);
        let merged = merge_analysis(&record, &analysis);
        assert_eq!(merged.objects[0].confidence, 1.0);
        assert_eq!(merged.confidence, 1.0);
    }

    #[test]
    fn test_mood_from_faces_dominant_emotion() {
        let mut record = pending();
        let mut first = BTreeMap::new();
        first.insert("happy".to_string(), 0.9);
        first.insert("surprised".to_string(), 0.4);
        let mut second = BTreeMap::new();
        second.insert("happy".to_string(), 0.7);
        second.insert("calm".to_string(), 0.6);
        record.faces = vec![
            Face {
                confidence: 0.9,
                emotions: first,
            },
            Face {
                confidence: 0.8,
                emotions: second,
            },
        ];

        let mood = derive_mood(&ImageAnalysis::default(), &record);
        assert_eq!(mood.overall_mood, "happy");
        // Second-strongest mean: calm (0.6) vs surprised (0.4).
        assert_eq!(mood.vibe, "calm");
    }

    #[test]
    fn test_mood_verbatim_from_service() {
        let record = pending();
        let analysis = analysis_from(r#"{"overall_mood": "joyful", "vibe": "energetic"}"#);
        let mood = derive_mood(&analysis, &record);
        assert_eq!(mood.overall_mood, "joyful");
        assert_eq!(mood.vibe, "energetic");
    }

    #[test]
    fn test_mood_from_image_level_emotions() {
        let record = pending();
        let analysis = analysis_from(r#"{"emotions": {"calm": 0.8, "peaceful": 0.7}}"#);
        let mood = derive_mood(&analysis, &record);
        assert_eq!(mood.overall_mood, "calm");
        assert_eq!(mood.vibe, "peaceful");
    }

    #[test]
    fn test_mood_defaults_when_nothing_known() {
        let mood = derive_mood(&ImageAnalysis::default(), &pending());
        assert_eq!(mood.overall_mood, "neutral");
        assert_eq!(mood.vibe, "balanced");
    }

    #[test]
    fn test_aggregate_confidence_empty_components() {
        let record = pending();
        assert_eq!(aggregate_confidence(&record, None), 0.0);
        assert_eq!(aggregate_confidence(&record, Some(0.6)), 0.6);
        assert_eq!(aggregate_confidence(&record, Some(2.0)), 1.0);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("c:\\photos\\cat.jpg"), "cat.jpg");
        assert_eq!(sanitize_filename("cat.jpg"), "cat.jpg");
    }

    // ---- Pipeline tests ----

    fn validator() -> MediaValidator {
        MediaValidator::new(
            1024 * 1024,
            vec!["jpg".to_string(), "png".to_string()],
            vec!["image/jpeg".to_string(), "image/png".to_string()],
        )
    }

    async fn service_with(
        dir: &tempfile::TempDir,
        vision_url: &str,
    ) -> (IngestService, ImageRepository) {
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/uploads".to_string())
            .await
            .unwrap();
        let vision = VisionClient::new(vision_url, Duration::from_secs(2), None).unwrap();
        let repository = ImageRepository::new();
        let service = IngestService::new(
            Arc::new(storage),
            vision,
            repository.clone(),
            validator(),
        );
        (service, repository)
    }

    fn upload(name: &str, data: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_ingest_complete_pipeline() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/analyze/complete")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"objects": [{"name": "cat", "confidence": 0.9}], "colors": ["black"]}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (service, repository) = service_with(&dir, &server.url()).await;

        let record = service.ingest(upload("cat.png", b"pngbytes")).await.unwrap();

        assert_eq!(record.objects[0].name, "cat");
        assert_eq!(record.tags, vec!["cat", "black"]);
        assert!(record.url.ends_with(&format!("{}.png", record.id)));

        let stored = repository.get(record.id).await.unwrap();
        assert_eq!(*stored, record);
    }

    #[tokio::test]
    async fn test_ingest_degrades_when_vision_down() {
        let dir = tempfile::tempdir().unwrap();
        let (service, repository) = service_with(&dir, "http://127.0.0.1:1").await;

        let record = service.ingest(upload("cat.png", b"pngbytes")).await.unwrap();

        assert!(record.objects.is_empty());
        assert!(record.tags.is_empty());
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.emotions.overall_mood, "neutral");
        assert_eq!(repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_upload_without_record() {
        let dir = tempfile::tempdir().unwrap();
        let (service, repository) = service_with(&dir, "http://127.0.0.1:1").await;

        let err = service.ingest(upload("cat.png", b"")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (service, repository) = service_with(&dir, "http://127.0.0.1:1").await;

        let mut bad = upload("script.exe", b"data");
        bad.content_type = "image/png".to_string();
        let err = service.ingest(bad).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(repository.is_empty().await);
    }

    struct FailingStorage;

    #[async_trait::async_trait]
    impl Storage for FailingStorage {
        async fn upload(
            &self,
            _filename: &str,
            _content_type: &str,
            _data: Vec<u8>,
        ) -> StorageResult<(String, String)> {
            Err(StorageError::UploadFailed("disk full".to_string()))
        }

        async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }

        async fn exists(&self, _key: &str) -> StorageResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_ingest_storage_failure_is_fatal() {
        let vision = VisionClient::new("http://127.0.0.1:1", Duration::from_secs(1), None).unwrap();
        let repository = ImageRepository::new();
        let service = IngestService::new(
            Arc::new(FailingStorage),
            vision,
            repository.clone(),
            validator(),
        );

        let err = service.ingest(upload("cat.png", b"data")).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_ingests_stay_isolated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/analyze/complete")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"colors": ["gray"]}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (service, repository) = service_with(&dir, &server.url()).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .ingest(upload(&format!("img{}.png", i), format!("data{}", i).as_bytes()))
                    .await
            }));
        }

        let mut ids = std::collections::BTreeSet::new();
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            ids.insert(record.id);
        }

        assert_eq!(ids.len(), 8);
        assert_eq!(repository.len().await, 8);
        for id in ids {
            let record = repository.get(id).await.unwrap();
            assert!(record.url.contains(&id.to_string()));
        }
    }
}
