use reqwest::Url;
use std::path::{Path, PathBuf};

use crate::task::UploadSettings;

/// What a piece of clipboard text turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardAction {
    DownloadUpload(String),
    ShortenUrl(String),
    ShareUrl(String),
    IndexFolder(PathBuf),
    UploadFiles(Vec<PathBuf>),
    UploadText(String),
}

/// Classify clipboard text according to the auto-detection flags
///
/// URLs honour the url-contents, shorten and share flags in that order and
/// fall back to a text upload. An existing directory is indexed when folder
/// indexing is on. Text whose every line names an existing file uploads
/// those files.
pub fn classify(text: &str, settings: &UploadSettings) -> ClipboardAction {
    let trimmed = text.trim();

    if let Some(url) = as_web_url(trimmed) {
        return if settings.clipboard_upload_url_contents {
            ClipboardAction::DownloadUpload(url)
        } else if settings.clipboard_upload_shorten_url {
            ClipboardAction::ShortenUrl(url)
        } else if settings.clipboard_upload_share_url {
            ClipboardAction::ShareUrl(url)
        } else {
            ClipboardAction::UploadText(text.to_string())
        };
    }

    if settings.clipboard_upload_auto_index_folder
        && !trimmed.is_empty()
        && !trimmed.contains('\n')
        && Path::new(trimmed).is_dir()
    {
        return ClipboardAction::IndexFolder(PathBuf::from(trimmed));
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if !lines.is_empty() && lines.iter().all(|line| Path::new(line).is_file()) {
        return ClipboardAction::UploadFiles(lines.into_iter().map(PathBuf::from).collect());
    }

    ClipboardAction::UploadText(text.to_string())
}

/// Single http(s) URL without embedded whitespace
pub fn as_web_url(text: &str) -> Option<String> {
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        return None;
    }
    let url = Url::parse(text).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(text.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_web_url_detection() {
        assert!(as_web_url("https://example.com/a?b=c").is_some());
        assert!(as_web_url("http://localhost:8080").is_some());
        assert!(as_web_url("ftp://example.com").is_none());
        assert!(as_web_url("see https://example.com").is_none());
        assert!(as_web_url("not a url").is_none());
    }

    #[test]
    fn test_url_flags_in_order() {
        let url = "https://example.com/image.png";
        let mut settings = UploadSettings::default();
        assert_eq!(classify(url, &settings), ClipboardAction::UploadText(url.to_string()));

        settings.clipboard_upload_share_url = true;
        assert_eq!(classify(url, &settings), ClipboardAction::ShareUrl(url.to_string()));

        settings.clipboard_upload_shorten_url = true;
        assert_eq!(classify(url, &settings), ClipboardAction::ShortenUrl(url.to_string()));

        settings.clipboard_upload_url_contents = true;
        assert_eq!(
            classify(&format!("  {url}\n"), &settings),
            ClipboardAction::DownloadUpload(url.to_string())
        );
    }

    #[test]
    fn test_folder_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.png");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let mut settings = UploadSettings::default();
        let folder = temp_dir.path().display().to_string();
        assert_eq!(
            classify(&folder, &settings),
            ClipboardAction::IndexFolder(temp_dir.path().to_path_buf())
        );

        settings.clipboard_upload_auto_index_folder = false;
        assert_eq!(classify(&folder, &settings), ClipboardAction::UploadText(folder.clone()));

        let list = format!("{}\n{}\n", a.display(), b.display());
        assert_eq!(classify(&list, &settings), ClipboardAction::UploadFiles(vec![a, b]));
    }

    #[test]
    fn test_plain_text() {
        let settings = UploadSettings::default();
        let text = "hello\n/definitely/not/a/file";
        assert_eq!(classify(text, &settings), ClipboardAction::UploadText(text.to_string()));
    }
}
