//! Configuration management for SnapX
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use snapx::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Upload limit: {}", config.manager.upload_limit);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `SNAPX__<section>__<key>`
//!
//! Examples:
//! - `SNAPX__MANAGER__UPLOAD_LIMIT=3`
//! - `SNAPX__HISTORY__REQUIRE_URL=false`
//! - `SNAPX__HTTP__PROXY=http://proxy:8080`
//!
//! `SNAPX_UPLOADER_TOKEN` is sent as a bearer token by custom uploaders
//! that do not configure their own `Authorization` header.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/snapx.toml`.
//! This can be overridden using the `SNAPX_CONFIG` environment variable.

mod models;
mod persist;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, CustomUploaderConfig, HistoryConfig, HttpConfig, HttpMethod, ManagerConfig,
    NotificationConfig, ObjectStorageConfig, RequestBody, StorageProvider, UploadersConfig,
};
pub use persist::{SettingsPersister, TomlSettingsFile};
pub use sources::config_path;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings lock poisoned")]
    Poisoned,
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`SNAPX__*`)
    /// 2. TOML file (default: `config/snapx.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without `.env` or secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from all sources with an explicit settings file
    pub fn load_with_file(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_at(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::AfterUploadTask;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[manager]
upload_limit = 0

[uploaders.file]
request_url = "https://files.example.com/upload"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.manager.upload_limit, 0);
        assert!(config.uploaders.file.is_some());
    }

    #[test]
    fn test_validation_catches_bad_uploader() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[uploaders.image]
request_url = "gopher://img.example.com"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidRequestUrl { .. })
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[manager]
upload_limit = 3
stop_grace_ms = 2000
recent_tasks_max = 20
multi_upload_warning = 5

[history]
enabled = true
require_url = true
path = "data/history"

[task]
after_capture = ["save_image_to_file", "upload_image_to_host"]
after_upload = ["use_url_shortener", "show_after_upload_window"]
image_destination = "custom_image_uploader"
text_destination = "file_uploader"
file_destination = "object_storage"
url_sharing_service = "reddit"

[task.upload]
name_pattern = "%pn_%y%mo%d_%ra{4}"
max_upload_size = "50MB"
clipboard_upload_url_contents = true

[uploaders.image]
name = "img"
request_url = "https://img.example.com/api/upload"
url = "{json:data.url}"
deletion_url = "{json:data.delete}"

[uploaders.image.headers]
X-Client = "snapx"

[uploaders.shortener]
request_url = "https://s.example.com/api"
body = "form_url_encoded"
url = "{json:short}"

[uploaders.shortener.arguments]
long = "{input}"

[uploaders.object_storage]
provider = "local"
root = "data/uploads"
public_url = "https://cdn.example.com/files"

[notifications]
play_sounds = false

[http]
request_timeout_secs = 60
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.manager.upload_limit, 3);
        assert_eq!(config.manager.recent_tasks_max, 20);
        assert!(config.task.has_after_upload(AfterUploadTask::ShowAfterUploadWindow));
        assert!(config.task.upload.clipboard_upload_url_contents);
        assert_eq!(config.uploaders.image.as_ref().unwrap().name.as_deref(), Some("img"));
        assert_eq!(
            config.uploaders.shortener.as_ref().unwrap().arguments["long"],
            "{input}"
        );
        assert!(!config.notifications.play_sounds);
        assert_eq!(config.http.request_timeout_secs, 60);
    }
}
