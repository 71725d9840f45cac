use crate::task::TaskSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Defaults copied into every new task
    #[serde(default)]
    pub task: TaskSettings,
    #[serde(default)]
    pub uploaders: UploadersConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Task manager and admission control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerConfig {
    /// Maximum concurrently active workers, 0 for unlimited
    #[serde(default = "default_upload_limit")]
    pub upload_limit: usize,
    /// Hard deadline between a stop request and a forced `Stopped`
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_recent_tasks_max")]
    pub recent_tasks_max: usize,
    /// Ask for confirmation when more files than this are uploaded at once
    #[serde(default = "default_multi_upload_warning")]
    pub multi_upload_warning: usize,
}

impl ManagerConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            upload_limit: default_upload_limit(),
            stop_grace_ms: default_stop_grace_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            recent_tasks_max: default_recent_tasks_max(),
            multi_upload_warning: default_multi_upload_warning(),
        }
    }
}

fn default_upload_limit() -> usize {
    5
}

fn default_stop_grace_ms() -> u64 {
    5_000
}

fn default_progress_interval_ms() -> u64 {
    250
}

fn default_recent_tasks_max() -> usize {
    10
}

fn default_multi_upload_warning() -> usize {
    10
}

/// History recording
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Skip successful tasks that produced no URL
    #[serde(default = "default_true")]
    pub require_url: bool,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    /// Records shown by `snapx history` when no limit is given
    #[serde(default = "default_history_load_limit")]
    pub load_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_url: true,
            path: default_history_path(),
            load_limit: default_history_load_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/history")
}

fn default_history_load_limit() -> usize {
    50
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
}

/// How a custom uploader encodes the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    None,
    #[default]
    MultipartFormData,
    FormUrlEncoded,
    Json,
    /// Raw file bytes as the request body
    Binary,
}

/// Generic HTTP uploader description
///
/// String fields accept `{input}` (the URL being shortened or shared) and
/// `{filename}`. Result templates additionally accept `{response}` and
/// `{json:path.to.field}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomUploaderConfig {
    pub name: Option<String>,
    pub request_url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query string parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Form or JSON body fields
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    #[serde(default = "default_file_form_name")]
    pub file_form_name: String,
    #[serde(default = "default_url_template")]
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub deletion_url: Option<String>,
    pub error_message: Option<String>,
    /// Bearer token from `SNAPX_UPLOADER_TOKEN`, never written back to disk
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_file_form_name() -> String {
    "file".to_string()
}

fn default_url_template() -> String {
    "{response}".to_string()
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory for the local provider
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub key_prefix: String,
    /// Public base URL; uploaded keys are appended to it
    pub public_url: Option<String>,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            root: default_storage_root(),
            key_prefix: String::new(),
            public_url: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/uploads")
}

/// Backend adapters available to the routing table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UploadersConfig {
    pub image: Option<CustomUploaderConfig>,
    pub text: Option<CustomUploaderConfig>,
    pub file: Option<CustomUploaderConfig>,
    pub shortener: Option<CustomUploaderConfig>,
    /// Link template for the custom sharing service, `{url}` is replaced
    pub sharing_template: Option<String>,
    #[serde(default)]
    pub object_storage: ObjectStorageConfig,
}

/// Sound and message notifications
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub play_sounds: bool,
    /// Shell command lines run for each sound kind
    pub capture_command: Option<String>,
    pub task_completed_command: Option<String>,
    pub action_completed_command: Option<String>,
    pub error_command: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            play_sounds: true,
            capture_command: None,
            task_completed_command: None,
            action_completed_command: None,
            error_command: None,
        }
    }
}

impl NotificationConfig {
    pub fn has_commands(&self) -> bool {
        self.capture_command.is_some()
            || self.task_completed_command.is_some()
            || self.action_completed_command.is_some()
            || self.error_command.is_some()
    }
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub proxy: Option<String>,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("SnapX/{}", env!("CARGO_PKG_VERSION"))
}
