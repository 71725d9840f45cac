//! HTTP client for downloading resources

use futures_util::StreamExt;
use reqwest::{Client, Proxy, Url};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::task::naming::sanitize_file_name;
use crate::uploaders::ProgressSink;

const FALLBACK_FILE_NAME: &str = "download";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Shared HTTP client used by downloads and custom uploaders
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(url) = config.proxy.as_deref() {
            let proxy = Proxy::all(url)
                .map_err(|e| DownloadError::InvalidUrl(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Stream `url` into a new file under `folder`
    ///
    /// The request races `cancel`; a cancelled or failed download leaves no
    /// partial file behind. Failures are not retried.
    pub async fn download_to(
        &self,
        url: &str,
        folder: &Path,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let url = parse_download_url(url)?;
        debug!(%url, "Starting download");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(url.clone()).send() => response.map_err(map_request_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        tokio::fs::create_dir_all(folder).await?;
        let name = file_name_from_url(&url).unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
        let path = unique_path(folder, &name).await;

        let total = response.content_length();
        let partial = PartialFile::new(path.clone());
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                    progress.report(written, total);
                }
                Some(Err(e)) => {
                    warn!(%url, error = %e, "Download interrupted");
                    return Err(DownloadError::RequestFailed(format!(
                        "Failed to read body: {}",
                        e
                    )));
                }
                None => break,
            }
        }

        file.flush().await?;
        drop(file);

        debug!(%url, size = written, path = %path.display(), "Download completed");
        Ok(partial.keep())
    }
}

fn map_request_error(e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::Timeout
    } else if e.is_redirect() {
        DownloadError::TooManyRedirects
    } else {
        DownloadError::RequestFailed(e.to_string())
    }
}

fn parse_download_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| DownloadError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(DownloadError::InvalidUrl(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

/// Last non-empty path segment, sanitized for the local file system
fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    Some(sanitize_file_name(segment))
}

/// `name`, or `stem (n).ext` when the name is taken
async fn unique_path(folder: &Path, name: &str) -> PathBuf {
    let candidate = folder.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1;
    loop {
        let file_name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = folder.join(file_name);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// Removes the file on drop unless the download finished
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial download");
                }
            }
        }
    }
}
