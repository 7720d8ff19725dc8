//! Configuration module
//!
//! Environment-based configuration, read once at process start. Every setting has
//! a default so the service can come up with nothing but `cargo run`, except where
//! a production deployment would be misconfigured without an explicit value.

use std::env;

const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_VISION_BASE_URL: &str = "http://localhost:5151";
const DEFAULT_VISION_TIMEOUT_SECS: u64 = 20;
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_MAX_UPLOAD_MB: usize = 25;

/// Application configuration (ingestion service).
#[derive(Clone, Debug)]
pub struct Config {
    server_port: u16,
    cors_origins: Vec<String>,
    environment: String,
    vision_base_url: String,
    vision_timeout_secs: u64,
    vision_api_key: Option<String>,
    upload_dir: String,
    public_base_url: String,
    max_upload_bytes: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let max_upload_mb = env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_MB.to_string())
            .parse::<usize>()
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .unwrap_or_else(|_| "jpg,jpeg,png,gif,webp,bmp".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .collect();

        let allowed_content_types = env::var("ALLOWED_CONTENT_TYPES")
            .unwrap_or_else(|_| {
                "image/jpeg,image/png,image/gif,image/webp,image/bmp".to_string()
            })
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .collect();

        // Optional credentials file for deployments that front a vendor vision API.
        let vision_api_key = match env::var("VISION_API_KEY_FILE") {
            Ok(path) => Some(
                std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .map_err(|e| {
                        anyhow::anyhow!("Failed to read VISION_API_KEY_FILE {}: {}", path, e)
                    })?,
            ),
            Err(_) => env::var("VISION_API_KEY").ok(),
        };

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", server_port));

        Ok(Config {
            server_port,
            cors_origins,
            environment,
            vision_base_url: env::var("VISION_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_VISION_BASE_URL.to_string()),
            vision_timeout_secs: env::var("VISION_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_VISION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_VISION_TIMEOUT_SECS),
            vision_api_key,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()),
            public_base_url,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            allowed_extensions,
            allowed_content_types,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS must not be empty"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_MB must be greater than zero"));
        }
        if !self.vision_base_url.starts_with("http://")
            && !self.vision_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "VISION_BASE_URL must be an http(s) URL, got '{}'",
                self.vision_base_url
            ));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn vision_base_url(&self) -> &str {
        &self.vision_base_url
    }

    pub fn vision_timeout_secs(&self) -> u64 {
        self.vision_timeout_secs
    }

    pub fn vision_api_key(&self) -> Option<&str> {
        self.vision_api_key.as_deref()
    }

    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    /// Base URL that stored image URLs are rooted at; uploads are served under
    /// `{public_base_url}/uploads`.
    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn uploads_base_url(&self) -> String {
        format!("{}/uploads", self.public_base_url.trim_end_matches('/'))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.allowed_content_types
    }
}
