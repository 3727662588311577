use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::StorageAppConfig;

/// Output encodings a rendition can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
}

impl OutputFormat {
    /// File extension used in derived asset names.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Options shared by the codec and the repository.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    /// Key prefix for rendition blobs. Default: "pictures/scaled".
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Key prefix for uploaded master images. Default: "pictures".
    #[serde(default = "default_master_path")]
    pub master_path: String,
    /// Default: jpeg.
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Lossy compression quality on a 1-100 scale. Default: 90.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_storage_path() -> String {
    "pictures/scaled".into()
}
fn default_master_path() -> String {
    "pictures".into()
}
fn default_quality() -> u8 {
    90
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            master_path: default_master_path(),
            output_format: OutputFormat::default(),
            quality: default_quality(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Default: "sqlite://rendition.db?mode=rwc".
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Default: 20.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://rendition.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    20
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single regeneration. Default: 30.
    #[serde(default = "default_regenerate_timeout_secs")]
    pub regenerate_timeout_secs: u64,
}

fn default_regenerate_timeout_secs() -> u64 {
    30
}

impl EngineConfig {
    pub fn regenerate_timeout(&self) -> Duration {
        Duration::from_secs(self.regenerate_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regenerate_timeout_secs: default_regenerate_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenditionAppConfig {
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub images: ImageOptions,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl RenditionAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("RENDITION_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("images.storage_path", "pictures/scaled")?
            .set_default("images.output_format", "jpeg")?
            .set_default("images.quality", 90_i64)?
            .set_default("engine.regenerate_timeout_secs", 30_i64)?
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., RENDITION__IMAGES__QUALITY)
            .add_source(Environment::with_prefix("RENDITION").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Message(format!(
                "images.quality must be within 1..=100, got {}",
                self.images.quality
            )));
        }
        if self.images.storage_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Message(
                "images.storage_path cannot be empty".into(),
            ));
        }
        Ok(())
    }
}
