//! Dispatch of user intents
//!
//! [`UploadManager`] turns "upload this", "shorten that" into a configured
//! [`TaskInfo`] and [`Worker`] and hands the worker to the [`TaskManager`].
//! Every task gets its own snapshot of the task settings taken at dispatch
//! time, so later settings edits never reach a running task.

pub mod clipboard;
pub mod indexer;

pub use clipboard::ClipboardAction;

use async_trait::async_trait;
use bytes::Bytes;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::manager::TaskManager;
use crate::notify::{NotificationSound, Notifier};
use crate::task::{DataType, TaskId, TaskInfo, TaskJob, TaskMetadata, TaskSettings};
use crate::worker::{TaskInput, Worker};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Nothing to upload: {0}")]
    NoInput(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Asks the user before large batches are queued
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Accepts every prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

#[async_trait]
impl Confirm for AlwaysConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Yes/no prompt on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, message: &str) -> bool {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "{message} [y/N] ");
            let _ = stdout.flush();

            let mut answer = String::new();
            if std::io::stdin().lock().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}

/// Builds tasks from user intents and queues them
pub struct UploadManager {
    tasks: TaskManager,
    config: Arc<RwLock<Config>>,
    notifier: Arc<dyn Notifier>,
    confirm: Arc<dyn Confirm>,
}

impl UploadManager {
    pub fn new(
        tasks: TaskManager,
        config: Arc<RwLock<Config>>,
        notifier: Arc<dyn Notifier>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            tasks,
            config,
            notifier,
            confirm,
        }
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Snapshot of the current task settings
    pub fn safe_settings(&self) -> Arc<TaskSettings> {
        let config = self.config.read().unwrap_or_else(|e| e.into_inner());
        Arc::new(config.task.clone())
    }

    fn multi_upload_warning(&self) -> usize {
        let config = self.config.read().unwrap_or_else(|e| e.into_inner());
        config.manager.multi_upload_warning
    }

    fn new_task(&self, job: TaskJob) -> TaskInfo {
        TaskInfo::new(job, self.safe_settings())
    }

    async fn queue(&self, info: TaskInfo, input: TaskInput) -> TaskId {
        let id = info.id;
        debug!(task_id = %id, job = ?info.job, "Dispatching task");
        self.tasks.start(Worker::new(info, input)).await;
        id
    }

    /// Upload a captured image with the configured after-capture actions
    pub async fn upload_image(&self, image: Bytes, metadata: TaskMetadata) -> Result<TaskId> {
        if image.is_empty() {
            return Err(DispatchError::NoInput("image is empty".to_string()));
        }
        self.notifier
            .play_notification_sound(NotificationSound::Capture)
            .await;

        let info = self.new_task(TaskJob::Job).with_metadata(metadata);
        Ok(self.queue(info, TaskInput::Image(image)).await)
    }

    /// Upload an in-memory payload under `file_name`
    pub async fn upload_data(&self, data: Bytes, file_name: &str) -> Result<TaskId> {
        if data.is_empty() {
            return Err(DispatchError::NoInput("data is empty".to_string()));
        }

        let mut info = self.new_task(TaskJob::DataUpload);
        if !file_name.is_empty() {
            info.data_type = DataType::from_path(Path::new(file_name));
            info.set_file_name(file_name);
        }
        Ok(self.queue(info, TaskInput::Data(data)).await)
    }

    /// Upload files, expanding directories recursively
    ///
    /// Batches larger than the configured warning threshold need
    /// confirmation first.
    pub async fn upload_files(&self, paths: &[PathBuf]) -> Result<Vec<TaskId>> {
        let files = expand_paths(paths.to_vec()).await?;
        if files.is_empty() {
            return Err(DispatchError::NoInput("no files found".to_string()));
        }

        let warning = self.multi_upload_warning();
        if warning > 0 && files.len() > warning {
            let message = format!("Are you sure you want to upload {} files?", files.len());
            if !self.confirm.confirm(&message).await {
                info!(count = files.len(), "Multi-file upload declined");
                return Err(DispatchError::Cancelled);
            }
        }

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            ids.push(self.upload_file(&file).await?);
        }
        Ok(ids)
    }

    pub async fn upload_file(&self, path: &Path) -> Result<TaskId> {
        if path.as_os_str().is_empty() {
            return Err(DispatchError::NoInput("file path is empty".to_string()));
        }

        let mut info = self.new_task(TaskJob::FileUpload);
        info.data_type = DataType::from_path(path);
        info.set_file_path(path);
        Ok(self.queue(info, TaskInput::None).await)
    }

    pub async fn upload_text(&self, text: &str) -> Result<TaskId> {
        if text.is_empty() {
            return Err(DispatchError::NoInput("text is empty".to_string()));
        }

        let info = self.new_task(TaskJob::TextUpload);
        Ok(self.queue(info, TaskInput::Text(text.to_string())).await)
    }

    /// Upload clipboard text, detecting URLs, folders and file lists
    pub async fn upload_clipboard(&self, text: &str) -> Result<Vec<TaskId>> {
        if text.trim().is_empty() {
            return Err(DispatchError::NoInput("clipboard is empty".to_string()));
        }

        let settings = self.safe_settings();
        let action = clipboard::classify(text, &settings.upload);
        debug!(?action, "Clipboard content classified");

        match action {
            ClipboardAction::DownloadUpload(url) => Ok(vec![self.download(&url, true).await?]),
            ClipboardAction::ShortenUrl(url) => Ok(vec![self.shorten_url(&url).await?]),
            ClipboardAction::ShareUrl(url) => Ok(vec![self.share_url(&url).await?]),
            ClipboardAction::IndexFolder(path) => Ok(vec![self.index_folder(&path).await?]),
            ClipboardAction::UploadFiles(files) => self.upload_files(&files).await,
            ClipboardAction::UploadText(text) => Ok(vec![self.upload_text(&text).await?]),
        }
    }

    /// Upload a text index of a folder tree
    pub async fn index_folder(&self, path: &Path) -> Result<TaskId> {
        let root = path.to_path_buf();
        let index = tokio::task::spawn_blocking(move || indexer::index_folder(&root))
            .await
            .map_err(|e| DispatchError::Io(std::io::Error::other(e)))??;

        let mut info = self.new_task(TaskJob::TextUpload);
        let extension = info.settings.upload.text_extension.clone();
        info.set_file_name(format!("{}_index.{}", indexer::folder_name(path), extension));
        Ok(self.queue(info, TaskInput::Text(index)).await)
    }

    pub async fn shorten_url(&self, url: &str) -> Result<TaskId> {
        self.url_task(TaskJob::ShortenUrl, url).await
    }

    pub async fn share_url(&self, url: &str) -> Result<TaskId> {
        self.url_task(TaskJob::ShareUrl, url).await
    }

    /// Download `url`, then upload it when `upload` is set
    pub async fn download(&self, url: &str, upload: bool) -> Result<TaskId> {
        let job = if upload {
            TaskJob::DownloadUpload
        } else {
            TaskJob::Download
        };
        self.url_task(job, url).await
    }

    async fn url_task(&self, job: TaskJob, url: &str) -> Result<TaskId> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DispatchError::NoInput("URL is empty".to_string()));
        }

        let info = self.new_task(job).with_source_url(url);
        Ok(self.queue(info, TaskInput::None).await)
    }
}

/// Files named by `paths`, with directories expanded depth first
async fn expand_paths(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack: Vec<PathBuf> = paths.into_iter().rev().collect();

    while let Some(path) = stack.pop() {
        let metadata = tokio::fs::metadata(&path).await?;
        if metadata.is_dir() {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = dir.next_entry().await? {
                entries.push(entry.path());
            }
            entries.sort();
            stack.extend(entries.into_iter().rev());
        } else {
            files.push(path);
        }
    }
    Ok(files)
}
