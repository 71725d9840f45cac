use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::metadata::TaskMetadata;
use super::result::UploadResult;
use super::settings::{
    AfterCaptureTask, FileDestination, ImageDestination, TaskSettings, TextDestination,
    UrlSharingServiceType, UrlShortenerType,
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "log", "md", "json", "xml", "csv", "html", "css", "js"];

/// Time-sortable task identifier (UUIDv7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of work requested; selects the stage list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskJob {
    /// Captured image with after-capture actions
    Job,
    DataUpload,
    FileUpload,
    TextUpload,
    ShortenUrl,
    ShareUrl,
    Download,
    DownloadUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Default,
    File,
    Image,
    Text,
    Url,
}

impl DataType {
    /// Classify a local file by extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            DataType::Image
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            DataType::Text
        } else {
            DataType::File
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Backend selection key, resolved from data type and destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UploaderKey {
    Image(ImageDestination),
    Text(TextDestination),
    File(FileDestination),
    Shortener(UrlShortenerType),
    Sharing(UrlSharingServiceType),
}

impl UploaderKey {
    /// Route a job to its backend; `None` when the job uploads nothing
    pub fn route(job: TaskJob, data_type: DataType, settings: &TaskSettings) -> Option<Self> {
        match job {
            TaskJob::Download => None,
            TaskJob::ShortenUrl => Some(UploaderKey::Shortener(settings.url_shortener)),
            TaskJob::ShareUrl => Some(UploaderKey::Sharing(settings.url_sharing_service)),
            _ => Some(match data_type {
                DataType::Image => match settings.image_destination {
                    ImageDestination::FileUploader => {
                        UploaderKey::File(settings.file_destination)
                    }
                    dest => UploaderKey::Image(dest),
                },
                DataType::Text => match settings.text_destination {
                    TextDestination::FileUploader => UploaderKey::File(settings.file_destination),
                    dest => UploaderKey::Text(dest),
                },
                DataType::File | DataType::Default | DataType::Url => {
                    UploaderKey::File(settings.file_destination)
                }
            }),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            UploaderKey::Image(d) => d.to_string(),
            UploaderKey::Text(d) => d.to_string(),
            UploaderKey::File(d) => d.to_string(),
            UploaderKey::Shortener(d) => d.to_string(),
            UploaderKey::Sharing(d) => d.to_string(),
        }
    }
}

impl fmt::Display for UploaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Mutable record of one task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    pub settings: Arc<TaskSettings>,
    pub job: TaskJob,
    /// Free-text progress note, unrelated to the formal status
    pub status: String,
    file_path: Option<PathBuf>,
    file_name: Option<String>,
    pub data_type: DataType,
    pub metadata: TaskMetadata,
    pub task_start_time: Option<DateTime<Utc>>,
    pub task_end_time: Option<DateTime<Utc>>,
    pub upload_duration: Option<Duration>,
    pub result: UploadResult,
    /// Input URL for shorten, share and download jobs
    pub source_url: Option<String>,
    pub keep_image: bool,
}

impl TaskInfo {
    pub fn new(job: TaskJob, settings: Arc<TaskSettings>) -> Self {
        let data_type = match job {
            TaskJob::Job => DataType::Image,
            TaskJob::TextUpload => DataType::Text,
            TaskJob::FileUpload | TaskJob::DataUpload => DataType::File,
            TaskJob::ShortenUrl | TaskJob::ShareUrl | TaskJob::Download | TaskJob::DownloadUpload => {
                DataType::Url
            }
        };

        Self {
            id: TaskId::new(),
            settings,
            job,
            status: String::new(),
            file_path: None,
            file_name: None,
            data_type,
            metadata: TaskMetadata::default(),
            task_start_time: None,
            task_end_time: None,
            upload_duration: None,
            result: UploadResult::default(),
            source_url: None,
            keep_image: false,
        }
    }

    pub fn with_metadata(mut self, metadata: TaskMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Set the local path; the file name follows its last component
    pub fn set_file_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if path.as_os_str().is_empty() {
            self.file_path = None;
            return;
        }
        self.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self.file_path = Some(path);
    }

    /// Set the file name; an existing path is renamed in place to keep both in sync
    pub fn set_file_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if let Some(path) = &self.file_path {
            self.file_path = Some(path.with_file_name(&name));
        }
        self.file_name = Some(name);
    }

    pub fn task_duration(&self) -> Option<Duration> {
        match (self.task_start_time, self.task_end_time) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }

    pub fn is_upload_job(&self) -> bool {
        match self.job {
            TaskJob::Job => self
                .settings
                .has_after_capture(AfterCaptureTask::UploadImageToHost),
            TaskJob::DataUpload
            | TaskJob::FileUpload
            | TaskJob::TextUpload
            | TaskJob::ShortenUrl
            | TaskJob::ShareUrl
            | TaskJob::DownloadUpload => true,
            TaskJob::Download => false,
        }
    }

    pub fn upload_destination(&self) -> Option<UploaderKey> {
        UploaderKey::route(self.job, self.data_type, &self.settings)
    }

    /// Display name of the backend this task uploads to
    pub fn uploader_host(&self) -> String {
        self.upload_destination()
            .map(|key| key.display_name())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::settings::UrlSharingServiceType;
    use chrono::TimeDelta;

    fn info(job: TaskJob) -> TaskInfo {
        TaskInfo::new(job, Arc::new(TaskSettings::default()))
    }

    #[test]
    fn test_file_path_derives_file_name() {
        let mut info = info(TaskJob::FileUpload);
        assert_eq!(info.file_name(), None);

        info.set_file_path("/tmp/shots/capture.png");
        assert_eq!(info.file_name(), Some("capture.png"));

        info.set_file_name("renamed.png");
        assert_eq!(info.file_path(), Some(Path::new("/tmp/shots/renamed.png")));
    }

    #[test]
    fn test_file_name_without_path() {
        let mut info = info(TaskJob::TextUpload);
        info.set_file_name("notes.txt");
        assert_eq!(info.file_name(), Some("notes.txt"));
        assert!(info.file_path().is_none());
    }

    #[test]
    fn test_task_duration_requires_both_bounds() {
        let mut info = info(TaskJob::FileUpload);
        let start = Utc::now();
        info.task_start_time = Some(start);
        assert_eq!(info.task_duration(), None);

        info.task_end_time = Some(start + TimeDelta::milliseconds(1500));
        assert_eq!(info.task_duration(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_is_upload_job() {
        assert!(info(TaskJob::Job).is_upload_job());
        assert!(info(TaskJob::ShareUrl).is_upload_job());
        assert!(!info(TaskJob::Download).is_upload_job());

        let mut settings = TaskSettings::default();
        settings.after_capture = [AfterCaptureTask::SaveImageToFile].into_iter().collect();
        let capture_only = TaskInfo::new(TaskJob::Job, Arc::new(settings));
        assert!(!capture_only.is_upload_job());
    }

    #[test]
    fn test_routing() {
        let mut settings = TaskSettings::default();
        settings.image_destination = ImageDestination::FileUploader;
        settings.file_destination = FileDestination::ObjectStorage;
        settings.url_sharing_service = UrlSharingServiceType::Twitter;

        assert_eq!(
            UploaderKey::route(TaskJob::Job, DataType::Image, &settings),
            Some(UploaderKey::File(FileDestination::ObjectStorage))
        );
        assert_eq!(
            UploaderKey::route(TaskJob::TextUpload, DataType::Text, &settings),
            Some(UploaderKey::Text(TextDestination::CustomTextUploader))
        );
        assert_eq!(
            UploaderKey::route(TaskJob::ShareUrl, DataType::Url, &settings),
            Some(UploaderKey::Sharing(UrlSharingServiceType::Twitter))
        );
        assert_eq!(UploaderKey::route(TaskJob::Download, DataType::Url, &settings), None);
    }

    #[test]
    fn test_uploader_host() {
        let info = info(TaskJob::ShortenUrl);
        assert_eq!(info.uploader_host(), "Custom URL shortener");
        assert_eq!(info.data_type, DataType::Url);
    }

    #[test]
    fn test_data_type_from_path() {
        assert_eq!(DataType::from_path(Path::new("a/B.PNG")), DataType::Image);
        assert_eq!(DataType::from_path(Path::new("notes.md")), DataType::Text);
        assert_eq!(DataType::from_path(Path::new("archive.zip")), DataType::File);
        assert_eq!(DataType::from_path(Path::new("README")), DataType::File);
    }

    #[test]
    fn test_task_ids_sort_by_creation() {
        let first = TaskId::new();
        let second = TaskId::new();
        assert!(first < second);
        assert_eq!(first.to_string().parse::<TaskId>().unwrap(), first);
    }
}
