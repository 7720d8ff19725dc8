//! Read-side queries over the collection: filtering, free-text search, and
//! tag-overlap relatedness.
//!
//! All queries run against an insertion-ordered snapshot of the repository, so
//! a concurrent upload never changes a result set mid-computation. Relatedness
//! is recomputed per snapshot rather than stored, so it is always consistent
//! with the records that exist right now.

use std::sync::Arc;

use photomesh_core::models::ImageRecord;
use photomesh_core::AppError;
use uuid::Uuid;

use crate::repository::ImageRepository;

/// How many related images to surface per record.
const RELATED_LIMIT: usize = 5;

/// Optional conjunctive filters for the list endpoint.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Case-insensitive exact tag match.
    pub tag: Option<String>,
    /// Case-insensitive substring match against object names.
    pub object: Option<String>,
    /// Case-insensitive exact mood match.
    pub mood: Option<String>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.object.is_none() && self.mood.is_none()
    }

    fn matches(&self, record: &ImageRecord) -> bool {
        if let Some(tag) = &self.tag {
            let tag = tag.to_lowercase();
            if !record.tags.iter().any(|t| t.to_lowercase() == tag) {
                return false;
            }
        }
        if let Some(object) = &self.object {
            let object = object.to_lowercase();
            if !record
                .objects
                .iter()
                .any(|o| o.name.to_lowercase().contains(&object))
            {
                return false;
            }
        }
        if let Some(mood) = &self.mood {
            if !record.emotions.overall_mood.eq_ignore_ascii_case(mood) {
                return false;
            }
        }
        true
    }
}

/// Read-side query API over the repository.
#[derive(Clone)]
pub struct QueryEngine {
    repository: ImageRepository,
}

impl QueryEngine {
    pub fn new(repository: ImageRepository) -> Self {
        Self { repository }
    }

    /// List records in insertion order, applying any filters conjunctively,
    /// with `related_images` filled in against the same snapshot.
    pub async fn list(&self, filter: &RecordFilter) -> Vec<ImageRecord> {
        let snapshot = self.repository.list().await;
        snapshot
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| with_related(r, &snapshot))
            .collect()
    }

    /// Fetch one record with its related images.
    pub async fn get(&self, id: Uuid) -> Result<ImageRecord, AppError> {
        let snapshot = self.repository.list().await;
        snapshot
            .iter()
            .find(|r| r.id == id)
            .map(|r| with_related(r, &snapshot))
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))
    }

    /// Free-text search across tags, object names, scene, mood, and vibe.
    ///
    /// Matching is case-insensitive substring. Results are ranked by how many
    /// distinct fields matched, then by aggregate confidence, then by upload
    /// order. An empty or whitespace query matches nothing.
    pub async fn search(&self, query: &str) -> Vec<ImageRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let snapshot = self.repository.list().await;
        let mut scored: Vec<(usize, usize, &Arc<ImageRecord>)> = snapshot
            .iter()
            .enumerate()
            .filter_map(|(position, record)| {
                let fields = field_matches(record, &needle);
                (fields > 0).then_some((fields, position, record))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| {
                    b.2.confidence
                        .partial_cmp(&a.2.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.1.cmp(&b.1))
        });

        scored
            .into_iter()
            .map(|(_, _, record)| with_related(record, &snapshot))
            .collect()
    }

    /// Ids of the images most related to `id` by tag overlap.
    pub async fn related(&self, id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let snapshot = self.repository.list().await;
        let target = snapshot
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))?;
        Ok(related_ids(target, &snapshot))
    }
}

/// Count how many distinct fields of `record` contain `needle` (lowercased).
fn field_matches(record: &ImageRecord, needle: &str) -> usize {
    let mut fields = 0;
    if record.tags.iter().any(|t| t.to_lowercase().contains(needle)) {
        fields += 1;
    }
    if record
        .objects
        .iter()
        .any(|o| o.name.to_lowercase().contains(needle))
    {
        fields += 1;
    }
    if record.scene.description.to_lowercase().contains(needle)
        || record.scene.category.to_lowercase().contains(needle)
    {
        fields += 1;
    }
    if record.emotions.overall_mood.to_lowercase().contains(needle) {
        fields += 1;
    }
    if record.emotions.vibe.to_lowercase().contains(needle) {
        fields += 1;
    }
    fields
}

/// Clone `record` with `related_images` computed against `snapshot`.
fn with_related(record: &ImageRecord, snapshot: &[Arc<ImageRecord>]) -> ImageRecord {
    let mut filled = record.clone();
    filled.related_images = related_ids(record, snapshot);
    filled
}

/// Jaccard tag overlap against every other record in the snapshot; at least
/// one shared tag required, top scores first, snapshot order breaks ties.
fn related_ids(target: &ImageRecord, snapshot: &[Arc<ImageRecord>]) -> Vec<Uuid> {
    let target_tags = target.tag_set();
    if target_tags.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, usize, Uuid)> = snapshot
        .iter()
        .enumerate()
        .filter(|(_, other)| other.id != target.id)
        .filter_map(|(position, other)| {
            let other_tags = other.tag_set();
            let shared = target_tags.intersection(&other_tags).count();
            if shared == 0 {
                return None;
            }
            let union = target_tags.union(&other_tags).count();
            Some((shared as f64 / union as f64, position, other.id))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    scored
        .into_iter()
        .take(RELATED_LIMIT)
        .map(|(_, _, id)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use photomesh_core::models::{DetectedObject, MoodSummary, Scene};

    fn record(tags: &[&str]) -> ImageRecord {
        let mut r = ImageRecord::pending(
            Uuid::new_v4(),
            "http://localhost/uploads/x.png".to_string(),
            "x.png".to_string(),
            "image/png".to_string(),
            8,
        );
        r.tags = tags.iter().map(|t| t.to_string()).collect();
        r
    }

    async fn repo_with(records: Vec<ImageRecord>) -> ImageRepository {
        let repo = ImageRepository::new();
        for r in records {
            repo.insert(r).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_filter_by_tag_case_insensitive() {
        let a = record(&["Cat", "black"]);
        let b = record(&["dog"]);
        let engine = QueryEngine::new(repo_with(vec![a.clone(), b]).await);

        let filter = RecordFilter {
            tag: Some("cat".to_string()),
            ..Default::default()
        };
        let results = engine.list(&filter).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, a.id);
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let mut a = record(&["cat"]);
        a.objects = vec![DetectedObject {
            name: "cat".to_string(),
            confidence: 0.9,
        }];
        a.emotions = MoodSummary {
            overall_mood: "happy".to_string(),
            vibe: "playful".to_string(),
        };
        let b = record(&["cat"]);
        let engine = QueryEngine::new(repo_with(vec![a.clone(), b]).await);

        let filter = RecordFilter {
            tag: Some("cat".to_string()),
            object: Some("ca".to_string()),
            mood: Some("happy".to_string()),
        };
        let results = engine.list(&filter).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, a.id);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let a = record(&["one"]);
        let b = record(&["two"]);
        let c = record(&["three"]);
        let ids = vec![a.id, b.id, c.id];
        let engine = QueryEngine::new(repo_with(vec![a, b, c]).await);

        let results = engine.list(&RecordFilter::default()).await;
        let got: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert_eq!(got, ids);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let engine = QueryEngine::new(ImageRepository::new());
        let err = engine.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_empty_query_matches_nothing() {
        let engine = QueryEngine::new(repo_with(vec![record(&["cat"])]).await);
        assert!(engine.search("").await.is_empty());
        assert!(engine.search("   ").await.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_field_matches_then_confidence() {
        // "cat" appears in one field of `tag_only`, two fields of `tag_and_object`.
        let tag_only = record(&["cat"]);
        let mut tag_and_object = record(&["cat"]);
        tag_and_object.objects = vec![DetectedObject {
            name: "cat".to_string(),
            confidence: 0.9,
        }];
        let mut high_confidence = record(&["cat"]);
        high_confidence.confidence = 0.9;

        let expected = vec![tag_and_object.id, high_confidence.id, tag_only.id];
        let engine =
            QueryEngine::new(repo_with(vec![tag_only, tag_and_object, high_confidence]).await);

        let results = engine.search("CAT").await;
        let got: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn test_search_covers_scene_and_mood() {
        let mut a = record(&[]);
        a.scene = Scene {
            description: "a quiet beach at sunset".to_string(),
            category: "nature".to_string(),
        };
        a.emotions = MoodSummary {
            overall_mood: "peaceful".to_string(),
            vibe: "serene".to_string(),
        };
        let engine = QueryEngine::new(repo_with(vec![a.clone()]).await);

        assert_eq!(engine.search("beach").await.len(), 1);
        assert_eq!(engine.search("peaceful").await.len(), 1);
        assert_eq!(engine.search("serene").await.len(), 1);
        assert!(engine.search("skyscraper").await.is_empty());
    }

    #[tokio::test]
    async fn test_related_by_shared_tags() {
        let black_cat = record(&["cat", "black"]);
        let white_cat = record(&["cat", "white"]);
        let dog = record(&["dog"]);
        let (cat_a, cat_b) = (black_cat.id, white_cat.id);
        let engine = QueryEngine::new(repo_with(vec![black_cat, white_cat, dog]).await);

        assert_eq!(engine.related(cat_a).await.unwrap(), vec![cat_b]);
        assert_eq!(engine.related(cat_b).await.unwrap(), vec![cat_a]);

        let listed = engine.list(&RecordFilter::default()).await;
        assert_eq!(listed[0].related_images, vec![cat_b]);
        assert!(listed[2].related_images.is_empty());
    }

    #[tokio::test]
    async fn test_related_ranked_by_overlap_and_capped() {
        let target = record(&["cat", "black", "indoor"]);
        let strong = record(&["cat", "black", "indoor"]);
        let weak = record(&["cat"]);
        let mut fillers = Vec::new();
        for _ in 0..6 {
            fillers.push(record(&["cat", "black"]));
        }

        let target_id = target.id;
        let strong_id = strong.id;
        let mut all = vec![target, weak, strong];
        all.extend(fillers);
        let engine = QueryEngine::new(repo_with(all).await);

        let related = engine.related(target_id).await.unwrap();
        assert_eq!(related.len(), RELATED_LIMIT);
        // Full overlap outranks partial, regardless of insertion order.
        assert_eq!(related[0], strong_id);
        assert!(!related.contains(&target_id));
    }

    #[tokio::test]
    async fn test_related_unknown_id_is_not_found() {
        let engine = QueryEngine::new(ImageRepository::new());
        let err = engine.related(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_related_empty_tags_relates_to_nothing() {
        let bare = record(&[]);
        let tagged = record(&["cat"]);
        let bare_id = bare.id;
        let engine = QueryEngine::new(repo_with(vec![bare, tagged]).await);
        assert!(engine.related(bare_id).await.unwrap().is_empty());
    }
}
