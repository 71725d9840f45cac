use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    CustomUploader, ObjectStorageUploader, Result, ShareLinkSharer, Uploader, UploaderError,
    UrlSharer, UrlShortener,
};
use crate::config::UploadersConfig;
use crate::task::{
    FileDestination, ImageDestination, TextDestination, UploaderKey, UrlSharingServiceType,
    UrlShortenerType,
};

/// Registry mapping routing keys to backend instances
#[derive(Clone, Default)]
pub struct UploaderRegistry {
    uploaders: BTreeMap<UploaderKey, Arc<dyn Uploader>>,
    shorteners: BTreeMap<UrlShortenerType, Arc<dyn UrlShortener>>,
    sharers: BTreeMap<UrlSharingServiceType, Arc<dyn UrlSharer>>,
}

impl UploaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploader; shortener and sharing keys are ignored here
    pub fn register_uploader(&mut self, key: UploaderKey, uploader: Arc<dyn Uploader>) {
        self.uploaders.insert(key, uploader);
    }

    pub fn register_shortener(&mut self, kind: UrlShortenerType, shortener: Arc<dyn UrlShortener>) {
        self.shorteners.insert(kind, shortener);
    }

    pub fn register_sharer(&mut self, kind: UrlSharingServiceType, sharer: Arc<dyn UrlSharer>) {
        self.sharers.insert(kind, sharer);
    }

    pub fn uploader(&self, key: UploaderKey) -> Result<Arc<dyn Uploader>> {
        self.uploaders
            .get(&key)
            .cloned()
            .ok_or_else(|| UploaderError::not_registered(key))
    }

    pub fn shortener(&self, kind: UrlShortenerType) -> Result<Arc<dyn UrlShortener>> {
        self.shorteners
            .get(&kind)
            .cloned()
            .ok_or_else(|| UploaderError::not_registered(UploaderKey::Shortener(kind)))
    }

    pub fn sharer(&self, kind: UrlSharingServiceType) -> Result<Arc<dyn UrlSharer>> {
        self.sharers
            .get(&kind)
            .cloned()
            .ok_or_else(|| UploaderError::not_registered(UploaderKey::Sharing(kind)))
    }

    pub fn has_uploader(&self, key: UploaderKey) -> bool {
        self.uploaders.contains_key(&key)
    }

    /// Build the registry from configuration
    ///
    /// Share links are always available; custom uploaders are registered for
    /// the slots that are configured and object storage for every data type.
    pub fn from_config(config: &UploadersConfig, client: &Client) -> Result<Self> {
        let mut registry = Self::with_share_links(config.sharing_template.as_deref());

        if let Some(image) = &config.image {
            let uploader = Arc::new(CustomUploader::new(client.clone(), image.clone()));
            registry.register_uploader(
                UploaderKey::Image(ImageDestination::CustomImageUploader),
                uploader,
            );
        }
        if let Some(text) = &config.text {
            let uploader = Arc::new(CustomUploader::new(client.clone(), text.clone()));
            registry.register_uploader(
                UploaderKey::Text(TextDestination::CustomTextUploader),
                uploader,
            );
        }
        if let Some(file) = &config.file {
            let uploader = Arc::new(CustomUploader::new(client.clone(), file.clone()));
            registry.register_uploader(
                UploaderKey::File(FileDestination::CustomFileUploader),
                uploader,
            );
        }
        if let Some(shortener) = &config.shortener {
            let shortener = Arc::new(CustomUploader::new(client.clone(), shortener.clone()));
            registry.register_shortener(UrlShortenerType::CustomUrlShortener, shortener);
        }

        let storage: Arc<dyn Uploader> =
            Arc::new(ObjectStorageUploader::from_config(&config.object_storage)?);
        registry.register_uploader(
            UploaderKey::Image(ImageDestination::ObjectStorage),
            storage.clone(),
        );
        registry.register_uploader(
            UploaderKey::Text(TextDestination::ObjectStorage),
            storage.clone(),
        );
        registry.register_uploader(UploaderKey::File(FileDestination::ObjectStorage), storage);

        tracing::debug!(
            uploaders = registry.uploaders.len(),
            shorteners = registry.shorteners.len(),
            sharers = registry.sharers.len(),
            "Uploader registry ready"
        );
        Ok(registry)
    }

    /// Registry holding only the share link services
    pub fn with_share_links(custom_template: Option<&str>) -> Self {
        let mut registry = Self::new();
        for service in [
            UrlSharingServiceType::Email,
            UrlSharingServiceType::Twitter,
            UrlSharingServiceType::Reddit,
        ] {
            registry.register_sharer(service, Arc::new(ShareLinkSharer::new(service)));
        }
        if let Some(template) = custom_template {
            registry.register_sharer(
                UrlSharingServiceType::CustomUrlSharingService,
                Arc::new(ShareLinkSharer::custom(template)),
            );
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ObjectStorageConfig, StorageProvider};

    fn memory_config() -> UploadersConfig {
        UploadersConfig {
            object_storage: ObjectStorageConfig {
                provider: StorageProvider::Memory,
                public_url: Some("https://cdn.example.com".to_string()),
                ..ObjectStorageConfig::default()
            },
            ..UploadersConfig::default()
        }
    }

    #[test]
    fn test_object_storage_serves_every_data_type() {
        let registry = UploaderRegistry::from_config(&memory_config(), &Client::new()).unwrap();

        assert!(registry.has_uploader(UploaderKey::Image(ImageDestination::ObjectStorage)));
        assert!(registry.has_uploader(UploaderKey::Text(TextDestination::ObjectStorage)));
        assert!(registry.has_uploader(UploaderKey::File(FileDestination::ObjectStorage)));
        assert!(!registry.has_uploader(UploaderKey::Image(ImageDestination::CustomImageUploader)));
    }

    #[test]
    fn test_missing_backend_is_reported() {
        let registry = UploaderRegistry::from_config(&memory_config(), &Client::new()).unwrap();

        let err = registry
            .uploader(UploaderKey::File(FileDestination::CustomFileUploader))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "no backend registered for Custom file uploader");
        assert!(registry.shortener(UrlShortenerType::CustomUrlShortener).is_err());
    }

    #[test]
    fn test_share_links_always_available() {
        let registry = UploaderRegistry::with_share_links(None);
        assert!(registry.sharer(UrlSharingServiceType::Email).is_ok());
        assert!(registry.sharer(UrlSharingServiceType::CustomUrlSharingService).is_err());

        let registry = UploaderRegistry::with_share_links(Some("https://s.example/{url}"));
        assert!(registry.sharer(UrlSharingServiceType::CustomUrlSharingService).is_ok());
    }
}
