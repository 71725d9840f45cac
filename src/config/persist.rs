use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

use super::ConfigError;
use super::models::Config;

/// Writes the live settings back to durable storage
#[async_trait]
pub trait SettingsPersister: Send + Sync {
    async fn save_all_settings(&self) -> Result<(), ConfigError>;
}

/// Saves the shared configuration as TOML at a fixed path
///
/// Nothing is written until the settings differ from what was last loaded
/// or saved. Environment secrets are not part of the serialized model.
pub struct TomlSettingsFile {
    path: PathBuf,
    settings: Arc<RwLock<Config>>,
    saved: Mutex<Option<String>>,
}

impl TomlSettingsFile {
    pub fn new(path: impl Into<PathBuf>, settings: Arc<RwLock<Config>>) -> Self {
        let baseline = render(&settings).ok();
        Self {
            path: path.into(),
            settings,
            saved: Mutex::new(baseline),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn last_saved(&self) -> Option<String> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SettingsPersister for TomlSettingsFile {
    async fn save_all_settings(&self) -> Result<(), ConfigError> {
        let content = render(&self.settings)?;
        if self.last_saved().as_deref() == Some(content.as_str()) {
            debug!(path = %self.path.display(), "Settings unchanged, nothing to save");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Atomic replace
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(content);

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

fn render(settings: &RwLock<Config>) -> Result<String, ConfigError> {
    let settings = settings.read().map_err(|_| ConfigError::Poisoned)?;
    Ok(toml::to_string_pretty(&*settings)?)
}
