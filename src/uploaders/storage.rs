//! Object storage uploader
//! Uses Apache Arrow object_store crate

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::sync::Arc;

use super::{ProgressSink, Result, Uploader, UploaderError};
use crate::config::{ObjectStorageConfig, StorageProvider};
use crate::task::UploadResult;

/// Stores payloads in an object store and links them under a public URL
#[derive(Clone)]
pub struct ObjectStorageUploader {
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
    base_url: String,
}

impl ObjectStorageUploader {
    /// Create an uploader with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, key_prefix: &str, base_url: &str) -> Self {
        Self {
            store,
            key_prefix: key_prefix.trim_matches('/').to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory(base_url: &str) -> Self {
        Self::new(Arc::new(InMemory::new()), "", base_url)
    }

    pub fn from_config(config: &ObjectStorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Memory => {
                let base_url = config.public_url.as_deref().unwrap_or("memory://snapx");
                Ok(Self::new(
                    Arc::new(InMemory::new()),
                    &config.key_prefix,
                    base_url,
                ))
            }
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.root).map_err(|e| {
                    UploaderError::InvalidConfig(format!(
                        "cannot create storage root {}: {e}",
                        config.root.display()
                    ))
                })?;
                let root = std::fs::canonicalize(&config.root).map_err(|e| {
                    UploaderError::InvalidConfig(format!(
                        "cannot resolve storage root {}: {e}",
                        config.root.display()
                    ))
                })?;
                let store = LocalFileSystem::new_with_prefix(&root)?;
                let base_url = config
                    .public_url
                    .clone()
                    .unwrap_or_else(|| format!("file://{}", root.display()));
                Ok(Self::new(Arc::new(store), &config.key_prefix, &base_url))
            }
        }
    }

    fn key_for(&self, file_name: &str) -> String {
        if self.key_prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.key_prefix, file_name)
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Fetch a stored object back, mainly for tests and diagnostics
    pub async fn fetch(&self, key: &str) -> Result<Bytes> {
        let result = self.store.get(&StoragePath::from(key)).await?;
        Ok(result.bytes().await?)
    }
}

#[async_trait]
impl Uploader for ObjectStorageUploader {
    async fn upload(
        &self,
        data: Bytes,
        file_name: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> UploadResult {
        let key = self.key_for(file_name);
        let size = data.len() as u64;
        progress.report(0, Some(size));

        match self.store.put(&StoragePath::from(key.as_str()), data.into()).await {
            Ok(put) => {
                progress.report(size, Some(size));
                tracing::info!(key, size, etag = ?put.e_tag, "Uploaded to object storage");
                UploadResult::with_url(self.url_for(&key))
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Object storage upload failed");
                UploadResult::from_error(format!("Object storage upload failed: {e}"))
            }
        }
    }
}
