//! PhotoMesh services: metadata repository, ingestion orchestration, and the
//! query engine over the collection.

pub mod ingest;
pub mod query;
pub mod repository;
pub mod validate;

pub use ingest::{IngestService, UploadedFile};
pub use query::{QueryEngine, RecordFilter};
pub use repository::ImageRepository;
pub use validate::{MediaValidator, ValidationError};
