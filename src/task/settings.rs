use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::humanize::ByteSize;

/// Actions applied to a freshly captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterCaptureTask {
    SaveImageToFile,
    UploadImageToHost,
    /// Remove the local file once it was uploaded
    DeleteFile,
}

/// Actions applied to a successful upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterUploadTask {
    UseUrlShortener,
    ShareUrl,
    ShowAfterUploadWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageDestination {
    #[default]
    CustomImageUploader,
    ObjectStorage,
    /// Route images through the file destination
    FileUploader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextDestination {
    #[default]
    CustomTextUploader,
    ObjectStorage,
    FileUploader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileDestination {
    #[default]
    CustomFileUploader,
    ObjectStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrlShortenerType {
    #[default]
    CustomUrlShortener,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrlSharingServiceType {
    #[default]
    Email,
    Twitter,
    Reddit,
    CustomUrlSharingService,
}

macro_rules! display_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name),+
                })
            }
        }
    };
}

display_names!(ImageDestination {
    CustomImageUploader => "Custom image uploader",
    ObjectStorage => "Object storage",
    FileUploader => "File uploader",
});
display_names!(TextDestination {
    CustomTextUploader => "Custom text uploader",
    ObjectStorage => "Object storage",
    FileUploader => "File uploader",
});
display_names!(FileDestination {
    CustomFileUploader => "Custom file uploader",
    ObjectStorage => "Object storage",
});
display_names!(UrlShortenerType {
    CustomUrlShortener => "Custom URL shortener",
});
display_names!(UrlSharingServiceType {
    Email => "Email",
    Twitter => "Twitter",
    Reddit => "Reddit",
    CustomUrlSharingService => "Custom URL sharing service",
});

/// Naming, folders and clipboard detection policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
    #[serde(default = "default_screenshots_folder")]
    pub screenshots_folder: PathBuf,
    /// Sub folder pattern below the screenshots folder, empty for none
    #[serde(default = "default_subfolder_pattern")]
    pub screenshots_subfolder_pattern: String,
    #[serde(default = "default_download_folder")]
    pub download_folder: PathBuf,
    #[serde(default = "default_text_extension")]
    pub text_extension: String,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
    pub max_upload_size: Option<ByteSize>,
    #[serde(default)]
    pub clipboard_upload_url_contents: bool,
    #[serde(default)]
    pub clipboard_upload_shorten_url: bool,
    #[serde(default)]
    pub clipboard_upload_share_url: bool,
    #[serde(default = "default_true")]
    pub clipboard_upload_auto_index_folder: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            name_pattern: default_name_pattern(),
            screenshots_folder: default_screenshots_folder(),
            screenshots_subfolder_pattern: default_subfolder_pattern(),
            download_folder: default_download_folder(),
            text_extension: default_text_extension(),
            image_extension: default_image_extension(),
            max_upload_size: None,
            clipboard_upload_url_contents: false,
            clipboard_upload_shorten_url: false,
            clipboard_upload_share_url: false,
            clipboard_upload_auto_index_folder: true,
        }
    }
}

fn default_name_pattern() -> String {
    "%y-%mo-%d_%h-%mi-%s_%ra{6}".to_string()
}

fn default_screenshots_folder() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_subfolder_pattern() -> String {
    "%y-%mo".to_string()
}

fn default_download_folder() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_text_extension() -> String {
    "txt".to_string()
}

fn default_image_extension() -> String {
    "png".to_string()
}

fn default_true() -> bool {
    true
}

/// Per-task behaviour, copied at dispatch time and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSettings {
    #[serde(default = "default_after_capture")]
    pub after_capture: BTreeSet<AfterCaptureTask>,
    #[serde(default)]
    pub after_upload: BTreeSet<AfterUploadTask>,
    #[serde(default)]
    pub image_destination: ImageDestination,
    #[serde(default)]
    pub text_destination: TextDestination,
    #[serde(default)]
    pub file_destination: FileDestination,
    #[serde(default)]
    pub url_shortener: UrlShortenerType,
    #[serde(default)]
    pub url_sharing_service: UrlSharingServiceType,
    #[serde(default)]
    pub upload: UploadSettings,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            after_capture: default_after_capture(),
            after_upload: BTreeSet::new(),
            image_destination: ImageDestination::default(),
            text_destination: TextDestination::default(),
            file_destination: FileDestination::default(),
            url_shortener: UrlShortenerType::default(),
            url_sharing_service: UrlSharingServiceType::default(),
            upload: UploadSettings::default(),
        }
    }
}

fn default_after_capture() -> BTreeSet<AfterCaptureTask> {
    [AfterCaptureTask::SaveImageToFile, AfterCaptureTask::UploadImageToHost]
        .into_iter()
        .collect()
}

impl TaskSettings {
    pub fn has_after_capture(&self, task: AfterCaptureTask) -> bool {
        self.after_capture.contains(&task)
    }

    pub fn has_after_upload(&self, task: AfterUploadTask) -> bool {
        self.after_upload.contains(&task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_save_and_upload_captures() {
        let settings = TaskSettings::default();
        assert!(settings.has_after_capture(AfterCaptureTask::SaveImageToFile));
        assert!(settings.has_after_capture(AfterCaptureTask::UploadImageToHost));
        assert!(!settings.has_after_capture(AfterCaptureTask::DeleteFile));
        assert!(settings.after_upload.is_empty());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let settings: TaskSettings = toml::from_str(
            r#"
after_capture = ["upload_image_to_host"]
after_upload = ["use_url_shortener", "share_url"]
image_destination = "file_uploader"
file_destination = "object_storage"

[upload]
max_upload_size = "25MB"
"#,
        )
        .unwrap();

        assert_eq!(settings.after_capture.len(), 1);
        assert!(settings.has_after_upload(AfterUploadTask::ShareUrl));
        assert_eq!(settings.image_destination, ImageDestination::FileUploader);
        assert_eq!(settings.file_destination, FileDestination::ObjectStorage);
        assert_eq!(settings.upload.max_upload_size, Some(ByteSize::mib(25)));
        assert_eq!(settings.upload.text_extension, "txt");
    }

    #[test]
    fn test_destination_display_names() {
        assert_eq!(ImageDestination::ObjectStorage.to_string(), "Object storage");
        assert_eq!(UrlSharingServiceType::Reddit.to_string(), "Reddit");
    }
}
