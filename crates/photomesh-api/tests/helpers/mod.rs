//! Test helpers: build the application against a mock vision service and a
//! temp upload directory.
//!
//! Run with: `cargo test -p photomesh-api`

pub mod fixtures;

use std::sync::Mutex;

use axum_test::TestServer;
use photomesh_api::setup::routes;
use photomesh_api::state::AppState;
use photomesh_core::Config;
use tempfile::TempDir;

/// Serializes environment mutation across parallel tests; the config is read
/// into an owned value while the lock is held.
static ENV_LOCK: Mutex<()> = Mutex::new(());

pub struct TestApp {
    pub server: TestServer,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Setup a test app pointed at the given vision service URL.
pub async fn setup_test_app(vision_url: &str) -> TestApp {
    setup_test_app_with_max_upload(vision_url, 25).await
}

/// Same, with a custom upload size cap in megabytes.
pub async fn setup_test_app_with_max_upload(vision_url: &str, max_upload_mb: usize) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp upload dir");

    let config = {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        std::env::set_var("ENVIRONMENT", "test");
        std::env::set_var("UPLOAD_DIR", temp_dir.path());
        std::env::set_var("VISION_BASE_URL", vision_url);
        std::env::set_var("VISION_TIMEOUT_SECS", "2");
        std::env::set_var("MAX_UPLOAD_MB", max_upload_mb.to_string());
        std::env::set_var("PUBLIC_BASE_URL", "http://localhost:8080");
        Config::from_env().expect("Failed to build test config")
    };

    let state = AppState::from_config(config.clone())
        .await
        .expect("Failed to build app state");
    let app = routes::setup_routes(&config, state).expect("Failed to build router");

    TestApp {
        server: TestServer::new(app).expect("Failed to start test server"),
        _temp_dir: temp_dir,
    }
}

/// A vision mock answering `/analyze/complete` with the given JSON body. Later
/// mocks on the same server take precedence, so tests can vary responses
/// between uploads.
pub async fn mock_analysis(server: &mut mockito::ServerGuard, body: &str) -> mockito::Mock {
    server
        .mock("POST", "/analyze/complete")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}
