//! Browser native messaging input
//!
//! The browser extension drops a JSON file such as
//! `{"Action": "UploadImage", "URL": "https://..."}` and launches the
//! binary with its path. The file is read once and deleted after parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dispatch::{DispatchError, UploadManager};
use crate::task::TaskId;

#[derive(Debug, Error)]
pub enum NativeMessageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid native message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Native message is missing {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub type Result<T> = std::result::Result<T, NativeMessageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NativeMessageAction {
    #[default]
    None,
    UploadImage,
    UploadVideo,
    UploadAudio,
    UploadText,
    #[serde(rename = "ShortenURL")]
    ShortenUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NativeMessage {
    #[serde(rename = "Action", default)]
    pub action: NativeMessageAction,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "Text", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NativeMessage {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and delete the message file
    ///
    /// The file is removed even when it does not parse.
    pub async fn read_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete native message file");
        }
        Self::parse(&content)
    }

    fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(NativeMessageError::MissingField("URL"))
    }

    fn text(&self) -> Result<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(NativeMessageError::MissingField("Text"))
    }

    /// Queue the task this message asks for; `None` for the empty action
    pub async fn dispatch(&self, uploads: &UploadManager) -> Result<Option<TaskId>> {
        debug!(action = ?self.action, "Handling native message");
        let id = match self.action {
            NativeMessageAction::None => return Ok(None),
            NativeMessageAction::UploadImage
            | NativeMessageAction::UploadVideo
            | NativeMessageAction::UploadAudio => uploads.download(self.url()?, true).await?,
            NativeMessageAction::UploadText => uploads.upload_text(self.text()?).await?,
            NativeMessageAction::ShortenUrl => uploads.shorten_url(self.url()?).await?,
        };
        Ok(Some(id))
    }
}
