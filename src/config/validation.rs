use super::models::{Config, CustomUploaderConfig, StorageProvider};
use crate::task::{FileDestination, ImageDestination, TextDestination};
use thiserror::Error;

const MAX_UPLOAD_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("upload_limit {actual} exceeds the maximum of {limit} (use 0 for unlimited)")]
    UploadLimitTooHigh { actual: usize, limit: usize },

    #[error("stop_grace_ms must be positive")]
    InvalidStopGrace,

    #[error("recent_tasks_max must be positive")]
    InvalidRecentTasksMax,

    #[error("task name pattern must not be empty")]
    EmptyNamePattern,

    #[error("uploader '{uploader}' has an invalid request URL '{url}': {reason}")]
    InvalidRequestUrl {
        uploader: String,
        url: String,
        reason: String,
    },

    #[error("uploader '{uploader}' has an empty file form name")]
    EmptyFileFormName { uploader: String },

    #[error("object storage public URL '{url}' must start with http:// or https://")]
    InvalidPublicUrl { url: String },

    #[error("custom sharing template must contain '{{url}}'")]
    InvalidSharingTemplate,

    #[error("max_upload_size must be positive")]
    InvalidMaxUploadSize,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_manager(config)?;
    validate_task(config)?;
    validate_uploaders(config)?;
    validate_object_storage(config)?;
    Ok(())
}

fn validate_manager(config: &Config) -> Result<(), ValidationError> {
    if config.manager.upload_limit > MAX_UPLOAD_LIMIT {
        return Err(ValidationError::UploadLimitTooHigh {
            actual: config.manager.upload_limit,
            limit: MAX_UPLOAD_LIMIT,
        });
    }

    if config.manager.stop_grace_ms == 0 {
        return Err(ValidationError::InvalidStopGrace);
    }

    if config.manager.recent_tasks_max == 0 {
        return Err(ValidationError::InvalidRecentTasksMax);
    }

    Ok(())
}

fn validate_task(config: &Config) -> Result<(), ValidationError> {
    if config.task.upload.name_pattern.trim().is_empty() {
        return Err(ValidationError::EmptyNamePattern);
    }

    if config
        .task
        .upload
        .max_upload_size
        .is_some_and(|size| size.as_u64() == 0)
    {
        return Err(ValidationError::InvalidMaxUploadSize);
    }

    Ok(())
}

/// Configured custom uploaders must describe a usable request
fn validate_uploaders(config: &Config) -> Result<(), ValidationError> {
    let uploaders = &config.uploaders;
    let named = [
        ("image", &uploaders.image),
        ("text", &uploaders.text),
        ("file", &uploaders.file),
        ("shortener", &uploaders.shortener),
    ];

    for (slot, uploader) in named {
        if let Some(uploader) = uploader {
            validate_custom_uploader(slot, uploader)?;
        }
    }

    if let Some(template) = &uploaders.sharing_template {
        if !template.contains("{url}") {
            return Err(ValidationError::InvalidSharingTemplate);
        }
    }

    Ok(())
}

fn validate_custom_uploader(
    slot: &str,
    uploader: &CustomUploaderConfig,
) -> Result<(), ValidationError> {
    let name = uploader.name.clone().unwrap_or_else(|| slot.to_string());

    // Placeholders are filled per request, so validate the static shape only
    let probe = uploader
        .request_url
        .replace("{input}", "x")
        .replace("{filename}", "x");
    match reqwest::Url::parse(&probe) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            return Err(ValidationError::InvalidRequestUrl {
                uploader: name,
                url: uploader.request_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Err(e) => {
            return Err(ValidationError::InvalidRequestUrl {
                uploader: name,
                url: uploader.request_url.clone(),
                reason: e.to_string(),
            });
        }
    }

    if uploader.file_form_name.trim().is_empty() {
        return Err(ValidationError::EmptyFileFormName { uploader: name });
    }

    Ok(())
}

fn validate_object_storage(config: &Config) -> Result<(), ValidationError> {
    let storage = &config.uploaders.object_storage;
    let selected = config.task.image_destination == ImageDestination::ObjectStorage
        || config.task.text_destination == TextDestination::ObjectStorage
        || config.task.file_destination == FileDestination::ObjectStorage;

    if let Some(url) = &storage.public_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ValidationError::InvalidPublicUrl { url: url.clone() });
        }
    } else if selected && storage.provider == StorageProvider::Memory {
        tracing::warn!("object storage uses the memory provider without a public URL");
    }

    Ok(())
}
