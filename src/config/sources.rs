use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "SNAPX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/snapx.toml";
const ENV_PREFIX: &str = "SNAPX";
const ENV_SEPARATOR: &str = "__";
const TOKEN_ENV_VAR: &str = "SNAPX_UPLOADER_TOKEN";

/// Path of the configuration file: `SNAPX_CONFIG` or `config/snapx.toml`
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    load_at(config_path())
}

/// Same layering as [`load`] with an explicit settings file
pub fn load_at(path: PathBuf) -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(path)?;
    load_secrets(&mut config, env::var(TOKEN_ENV_VAR).ok());

    Ok(config)
}

/// Hand the uploader token from the environment to every custom uploader
///
/// The token lives in a field that is never serialized; uploaders send it
/// as a bearer token unless they configure their own `Authorization` header.
fn load_secrets(config: &mut Config, token: Option<String>) {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return;
    };

    let uploaders = &mut config.uploaders;
    for uploader in [
        &mut uploaders.image,
        &mut uploaders.text,
        &mut uploaders.file,
        &mut uploaders.shortener,
    ]
    .into_iter()
    .flatten()
    {
        uploader.token = Some(token.clone());
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // SNAPX__MANAGER__UPLOAD_LIMIT -> manager.upload_limit
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
