//! Configuration loading and management

use anyhow::{Context, Result};
use circlefeed_adapters::media::MediaLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl MediaConfig {
    pub fn limits(&self) -> MediaLimits {
        MediaLimits {
            max_upload_bytes: self.max_upload_bytes,
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./circlefeed.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("./media")
}

fn default_max_upload_bytes() -> usize {
    MediaLimits::default().max_upload_bytes
}

fn default_allowed_extensions() -> Vec<String> {
    MediaLimits::default().allowed_extensions
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./circlefeed.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("CIRCLEFEED")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("media.allowed_extensions"),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> Result<String> {
        let body = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")?;
        Ok(format!(
            "# circlefeed configuration\n\
             # Every key can be overridden from the environment,\n\
             # e.g. CIRCLEFEED__GENERAL__DATABASE_PATH=/var/lib/circlefeed.sqlite\n\n{}",
            body
        ))
    }
}
