//! Backend adapters
//!
//! Adapters turn a payload into an [`UploadResult`]. Transport faults (HTTP
//! status, timeouts, malformed responses) are reported as result errors so
//! the worker never has to interpret protocol details.
//!
//! ## Key Components
//!
//! - [`Uploader`], [`UrlShortener`], [`UrlSharer`] - backend capabilities
//! - [`UploaderRegistry`] - routing table keyed on [`UploaderKey`](crate::task::UploaderKey)
//! - [`CustomUploader`] - configurable HTTP uploader and shortener
//! - [`ObjectStorageUploader`] - `object_store` backed uploader
//! - [`ShareLinkSharer`] - share links for email, Twitter, Reddit or a template

mod custom;
mod registry;
mod sharing;
mod storage;

pub use custom::CustomUploader;
pub use registry::UploaderRegistry;
pub use sharing::ShareLinkSharer;
pub use storage::ObjectStorageUploader;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

use crate::task::{UploadResult, UploaderKey};

#[derive(Debug, Error)]
pub enum UploaderError {
    #[error("no backend registered for {0}")]
    NotRegistered(String),

    #[error("invalid uploader configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store error: {0}")]
    Storage(#[from] object_store::Error),
}

impl UploaderError {
    pub fn not_registered(key: UploaderKey) -> Self {
        UploaderError::NotRegistered(key.display_name())
    }
}

pub type Result<T> = std::result::Result<T, UploaderError>;

/// Receives byte progress while a payload is sent
pub trait ProgressSink: Send + Sync {
    fn report(&self, position: u64, total: Option<u64>);
}

/// Progress sink that drops every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _position: u64, _total: Option<u64>) {}
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        data: Bytes,
        file_name: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> UploadResult;
}

#[async_trait]
pub trait UrlShortener: Send + Sync {
    async fn shorten(&self, url: &str) -> UploadResult;
}

#[async_trait]
pub trait UrlSharer: Send + Sync {
    async fn share(&self, url: &str) -> UploadResult;
}
