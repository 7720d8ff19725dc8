//! In-memory metadata repository.
//!
//! The one fully shared mutable resource in the system. Records are stored as
//! `Arc<ImageRecord>` and replaced wholesale on update, so a reader holds either
//! the pre-analysis or the post-analysis version of a record, never a torn mix.
//! Locks are held only for map operations; no I/O happens under them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use photomesh_core::models::{CollectionStats, ImageRecord};
use photomesh_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    /// Insertion order of ids; the stable order for `list()` and tie-breaking.
    order: Vec<Uuid>,
    records: HashMap<Uuid, Arc<ImageRecord>>,
}

/// Process-scoped image metadata repository.
#[derive(Clone, Default)]
pub struct ImageRepository {
    inner: Arc<RwLock<Inner>>,
}

impl ImageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly ingested record. Ids are generated per upload and never
    /// reused, so a duplicate insert indicates a bug upstream.
    pub async fn insert(&self, record: ImageRecord) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let id = record.id;
        if inner.records.contains_key(&id) {
            return Err(AppError::Internal(format!(
                "Duplicate image id on insert: {}",
                id
            )));
        }
        inner.order.push(id);
        inner.records.insert(id, Arc::new(record));
        Ok(())
    }

    /// Atomically replace an existing record (the analysis-merge path).
    pub async fn update(&self, record: ImageRecord) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let id = record.id;
        if !inner.records.contains_key(&id) {
            return Err(AppError::NotFound(format!("Image not found: {}", id)));
        }
        inner.records.insert(id, Arc::new(record));
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<ImageRecord>> {
        self.inner.read().await.records.get(&id).cloned()
    }

    /// Consistent snapshot of all records in insertion order.
    pub async fn list(&self) -> Vec<Arc<ImageRecord>> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Aggregate statistics over the full collection.
    pub async fn stats(&self) -> CollectionStats {
        let records = self.list().await;
        if records.is_empty() {
            return CollectionStats::default();
        }

        let mut distinct_tags: BTreeSet<String> = BTreeSet::new();
        let mut total_objects = 0;
        let mut total_faces = 0;
        let mut confidence_sum = 0.0f32;

        for record in &records {
            total_objects += record.objects.len();
            total_faces += record.faces.len();
            confidence_sum += record.confidence;
            for tag in &record.tags {
                distinct_tags.insert(tag.to_lowercase());
            }
        }

        CollectionStats {
            total_images: records.len(),
            total_objects,
            total_faces,
            total_tags: distinct_tags.len(),
            avg_confidence: confidence_sum / records.len() as f32,
        }
    }
}
