//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use photomesh_core::Config;
use photomesh_services::{ImageRepository, IngestService, MediaValidator, QueryEngine};
use photomesh_storage::LocalStorage;
use photomesh_vision::VisionClient;

pub struct AppState {
    pub config: Config,
    pub ingest: IngestService,
    pub query: QueryEngine,
    pub repository: ImageRepository,
    pub vision: VisionClient,
    /// Directory the static file route serves uploaded bytes from.
    pub upload_dir: PathBuf,
}

impl AppState {
    /// Wire up storage, the vision client, and the services from configuration.
    pub async fn from_config(config: Config) -> Result<Arc<Self>, anyhow::Error> {
        let storage = LocalStorage::new(config.upload_dir(), config.uploads_base_url()).await?;
        let upload_dir = storage.base_path().to_path_buf();

        let vision = VisionClient::new(
            config.vision_base_url(),
            Duration::from_secs(config.vision_timeout_secs()),
            config.vision_api_key().map(String::from),
        )?;

        let validator = MediaValidator::new(
            config.max_upload_bytes(),
            config.allowed_extensions().to_vec(),
            config.allowed_content_types().to_vec(),
        );

        let repository = ImageRepository::new();
        let ingest = IngestService::new(
            Arc::new(storage),
            vision.clone(),
            repository.clone(),
            validator,
        );
        let query = QueryEngine::new(repository.clone());

        Ok(Arc::new(AppState {
            config,
            ingest,
            query,
            repository,
            vision,
            upload_dir,
        }))
    }
}
